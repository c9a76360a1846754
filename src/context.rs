// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Security context lifecycle.
//!
//! A [`SecurityContext`] is one negotiated GSS context with a DNS server and the
//! TSIG key name bound to it. Negotiation runs the TKEY exchange until the GSS
//! mechanism reports the context complete; teardown releases the context. A
//! context that is dropped while still live is released on drop.

use hickory_proto::op::Message;
use hickory_proto::rr::Name;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::MAX_NEGOTIATION_ROUNDS;
use crate::dns_errors::{Result, WinDnsError};
use crate::gss::{ContextRequest, GssError, GssMechanism, GssSession};
use crate::krb5::Krb5Config;
use crate::tkey::{build_tkey_query, generate_key_name, parse_tkey_response};
use crate::transport::{round_trip, DnsTransport};
use crate::tsig::{sign_message, unix_now, GssTsigSigner, SignedMessage};

/// Inputs to one negotiation.
#[derive(Clone)]
pub struct NegotiationParams {
    /// DNS server (and default KDC) host
    pub server_host: String,
    /// Kerberos realm / AD domain
    pub realm: String,
    /// Principal user name
    pub username: String,
    /// Principal password
    pub password: String,
    /// KDC hosts; empty means the server host is the only KDC
    pub kdc_hosts: Vec<String>,
    /// Pre-built realm configuration, bypassing synthesis
    pub krb5: Option<Krb5Config>,
}

impl std::fmt::Debug for NegotiationParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiationParams")
            .field("server_host", &self.server_host)
            .field("realm", &self.realm)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("kdc_hosts", &self.kdc_hosts)
            .field("krb5", &self.krb5.is_some())
            .finish()
    }
}

impl NegotiationParams {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("server host", &self.server_host),
            ("realm", &self.realm),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(WinDnsError::configuration(format!("no {field} specified")));
            }
        }
        Ok(())
    }

    /// The realm configuration handed to the mechanism.
    fn realm_config(&self) -> Result<Krb5Config> {
        if let Some(config) = &self.krb5 {
            return Ok(config.clone());
        }
        if self.kdc_hosts.is_empty() {
            Krb5Config::from_domain(&self.realm, &[&self.server_host])
        } else {
            Krb5Config::from_domain(&self.realm, self.kdc_hosts.as_slice())
        }
    }
}

/// One negotiated GSS context and its TSIG key name.
pub struct SecurityContext {
    server: String,
    realm: String,
    key_name: Name,
    session: Arc<dyn GssSession>,
    live: bool,
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("server", &self.server)
            .field("realm", &self.realm)
            .field("key_name", &self.key_name)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

impl SecurityContext {
    /// Server the context was negotiated with.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Kerberos realm of the context.
    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// TSIG key name bound to the context.
    #[must_use]
    pub fn key_name(&self) -> &Name {
        &self.key_name
    }

    /// False once the context was torn down.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Shared handle to the signing session.
    #[must_use]
    pub fn session(&self) -> Arc<dyn GssSession> {
        Arc::clone(&self.session)
    }

    /// Sign `message` with this context's key at the current time.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::NoContext`] once the context was torn down.
    pub fn sign(&self, message: Message) -> Result<SignedMessage> {
        if !self.live {
            return Err(WinDnsError::NoContext);
        }
        sign_message(message, &self.key_name, self.session.as_ref(), unix_now())
    }

    /// A hickory message finalizer signing with this context.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::NoContext`] once the context was torn down.
    pub fn signer(&self) -> Result<GssTsigSigner> {
        if !self.live {
            return Err(WinDnsError::NoContext);
        }
        Ok(GssTsigSigner::new(
            self.key_name.clone(),
            Arc::clone(&self.session),
        ))
    }

    /// Release the GSS state of this context.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::NoContext`] if the context was already torn down,
    /// or an authentication error if the mechanism fails to release it. The
    /// context is no longer live afterwards either way.
    pub fn teardown(&mut self) -> Result<()> {
        if !self.live {
            return Err(WinDnsError::NoContext);
        }
        self.live = false;
        self.session.delete().map_err(|e| {
            WinDnsError::authentication(&self.server, format!("context release failed: {e}"))
        })?;
        info!("Released security context {} on {}", self.key_name, self.server);
        Ok(())
    }
}

impl Drop for SecurityContext {
    fn drop(&mut self) {
        if self.live {
            debug!("Releasing security context {} on drop", self.key_name);
            if let Err(e) = self.session.delete() {
                warn!("Failed to release security context {}: {}", self.key_name, e);
            }
        }
    }
}

fn map_gss_error(server: &str, err: GssError) -> WinDnsError {
    match err {
        GssError::Unreachable(reason) => WinDnsError::network(server, reason),
        other => WinDnsError::authentication(server, other),
    }
}

/// Negotiate a new security context with `params.server_host`.
///
/// The mechanism obtains a ticket for `DNS/<host>`; its tokens are then carried
/// to the server in TKEY queries until the context is established.
///
/// # Errors
///
/// - [`WinDnsError::Configuration`] for empty credentials or an unusable realm
///   configuration
/// - [`WinDnsError::Authentication`] when the KDC or server rejects the context
/// - [`WinDnsError::Network`] or [`WinDnsError::Timeout`] when the handshake
///   cannot complete
pub async fn negotiate(
    mechanism: &dyn GssMechanism,
    transport: &dyn DnsTransport,
    params: &NegotiationParams,
    deadline: Duration,
) -> Result<SecurityContext> {
    params.validate()?;
    let server = params.server_host.as_str();
    let krb5 = params.realm_config()?;
    let realm = krb5
        .default_realm()
        .map_or_else(|| params.realm.to_uppercase(), str::to_string);

    info!(
        "Negotiating security context with {} as {}@{}",
        server, params.username, realm
    );

    let request = ContextRequest::new(server, &realm, &params.username, &params.password, krb5);
    let mut initiator = mechanism
        .initiate(&request)
        .await
        .map_err(|e| map_gss_error(server, e))?;
    let key_name = generate_key_name(server)?;

    let mut input: Option<Vec<u8>> = None;
    let mut established = false;
    for round in 1..=MAX_NEGOTIATION_ROUNDS {
        let step = initiator
            .step(input.as_deref())
            .map_err(|e| map_gss_error(server, e))?;

        if let Some(token) = step.token {
            debug!(
                "TKEY round {} for {}: sending {} byte token",
                round,
                key_name,
                token.len()
            );
            let query = build_tkey_query(&key_name, &token, unix_now())?;
            let reply = round_trip(transport, server, &query, deadline).await?;
            input = Some(parse_tkey_response(&reply, &key_name, server)?.key);
        } else if !step.complete {
            return Err(WinDnsError::authentication(
                server,
                "mechanism produced no token for an incomplete context",
            ));
        }

        if step.complete {
            established = true;
            break;
        }
    }
    if !established {
        return Err(WinDnsError::authentication(
            server,
            format!("context not established after {MAX_NEGOTIATION_ROUNDS} rounds"),
        ));
    }

    let session: Arc<dyn GssSession> = Arc::from(
        initiator
            .into_session()
            .map_err(|e| map_gss_error(server, e))?,
    );

    info!("Established security context {} with {}", key_name, server);

    Ok(SecurityContext {
        server: server.to_string(),
        realm,
        key_name,
        session,
        live: true,
    })
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
