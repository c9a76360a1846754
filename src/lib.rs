// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # windns - secure dynamic DNS updates for Active Directory DNS
//!
//! A client for RFC 2136 dynamic updates against Kerberos-authenticated DNS
//! servers (such as AD-integrated DNS), signing every message with GSS-TSIG
//! (RFC 3645).
//!
//! ## Overview
//!
//! - Negotiates a GSS security context with the DNS server over TKEY and binds
//!   a TSIG key name to it
//! - Builds UPDATE messages from master-file style record lines, with removals
//!   always encoded before insertions
//! - Signs, sends and classifies each exchange, keeping the server's reply even
//!   when it reports an error
//! - Tears the context down explicitly, or on drop
//!
//! The Kerberos mechanism itself is supplied by the caller through the
//! [`gss::GssMechanism`] trait.
//!
//! ## Modules
//!
//! - [`client`] - The [`client::Client`] and its configuration
//! - [`records`] - Per-record-type insert, remove and update operations
//! - [`context`] - Security context negotiation and teardown
//! - [`exchange`] - One signed round trip and its classified outcome
//! - [`update`] - UPDATE and query message composition
//! - [`tsig`] / [`tkey`] - GSS-TSIG signing and TKEY negotiation messages
//! - [`krb5`] - Kerberos realm configuration
//! - [`dns_errors`] - Error taxonomy
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use windns::gss::GssMechanism;
//! use windns::client::{Client, ClientConfig};
//!
//! # async fn run(mechanism: Arc<dyn GssMechanism>) -> windns::dns_errors::Result<()> {
//! let config = ClientConfig::new("dns.example.com", "EXAMPLE.COM", "svc", "secret");
//! let client = Client::connect(config, Vec::new(), mechanism).await?;
//!
//! let result = client
//!     .update_a("test4", "dns.example.com", "example.com", "192.168.2.223", "192.168.2.224", 300)
//!     .await?;
//! if let Some(err) = result.error() {
//!     eprintln!("update rejected after {:?}: {err}", result.rtt);
//! }
//!
//! let value = client
//!     .lookup("dns.example.com", "test4.example.com")
//!     .await?
//!     .into_value()?;
//! assert_eq!(value, "192.168.2.224");
//!
//! client.cleanup().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod constants;
pub mod context;
pub mod dns_errors;
pub mod exchange;
pub mod gss;
pub mod krb5;
pub mod record;
pub mod records;
pub mod request;
pub mod tkey;
pub mod transport;
pub mod tsig;
pub mod update;

#[cfg(test)]
mod testing;
