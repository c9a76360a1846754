// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! The secure dynamic update client.
//!
//! A [`Client`] owns at most one live [`SecurityContext`], guarded by a mutex so
//! negotiation, teardown and signing never interleave. Every message it sends
//! is signed with the current context's key.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use windns::gss::GssMechanism;
//! use windns::client::{Client, ClientConfig, ClientOption};
//!
//! # async fn run(mechanism: Arc<dyn GssMechanism>) -> windns::dns_errors::Result<()> {
//! let config = ClientConfig::new("dc1.example.com", "example.com", "svc", "secret");
//! let client = Client::connect(
//!     config,
//!     vec![ClientOption::KdcHosts(vec!["dc1.example.com".into()])],
//!     mechanism,
//! )
//! .await?;
//!
//! client
//!     .insert_a("www", "dc1.example.com", "example.com", "192.0.2.10", 300)
//!     .await?
//!     .into_result()?;
//! client.cleanup().await?;
//! # Ok(())
//! # }
//! ```

use hickory_proto::op::Message;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_EXCHANGE_TIMEOUT_SECS, DNS_PORT};
use crate::context::{negotiate, NegotiationParams, SecurityContext};
use crate::dns_errors::{Result, WinDnsError};
use crate::exchange::{exchange, ExchangeResult};
use crate::gss::{GssMechanism, GssSession};
use crate::krb5::Krb5Config;
use crate::record::rdata_field;
use crate::transport::{DnsTransport, NetTransport};
use crate::tsig::SignedMessage;
use crate::update::{build_query, build_update};

fn default_port() -> u16 {
    DNS_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_EXCHANGE_TIMEOUT_SECS
}

/// Credentials and connection settings.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// DNS server the context is negotiated with; also the default KDC
    pub krb5_host: String,
    /// AD domain, used as the Kerberos realm
    pub domain: String,
    /// Principal user name
    pub username: String,
    /// Principal password
    pub password: String,
    /// KDC hosts overriding `krb5_host`
    #[serde(default)]
    pub kdc_hosts: Vec<String>,
    /// Pre-built krb5 configuration text
    #[serde(default)]
    pub krb5_config: Option<String>,
    /// DNS port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-exchange deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("krb5_host", &self.krb5_host)
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("kdc_hosts", &self.kdc_hosts)
            .field("krb5_config", &self.krb5_config.as_ref().map(|_| "<inline>"))
            .field("port", &self.port)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with default port, timeout and KDCs.
    #[must_use]
    pub fn new(krb5_host: &str, domain: &str, username: &str, password: &str) -> Self {
        Self {
            krb5_host: krb5_host.to_string(),
            domain: domain.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            kdc_hosts: Vec::new(),
            krb5_config: None,
            port: DNS_PORT,
            timeout_secs: DEFAULT_EXCHANGE_TIMEOUT_SECS,
        }
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("krb5host", &self.krb5_host),
            ("domain", &self.domain),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.is_empty() {
                return Err(WinDnsError::configuration(format!(
                    "missing required configuration for {field}"
                )));
            }
        }
        Ok(())
    }
}

/// Construction-time mutators, applied in order. The first one that fails
/// aborts construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOption {
    /// Use this krb5 configuration text instead of the synthesized one
    Krb5ConfigText(String),
    /// Load the krb5 configuration from a file
    Krb5ConfigFile(PathBuf),
    /// Synthesize the krb5 configuration for another domain and KDC list
    Krb5ConfigData {
        /// Realm domain
        domain: String,
        /// KDC hosts
        kdcs: Vec<String>,
    },
    /// Override the KDC hosts (default: the krb5 host)
    KdcHosts(Vec<String>),
    /// DNS port for all exchanges
    Port(u16),
    /// Per-exchange deadline
    Timeout(Duration),
}

#[derive(Debug, Clone)]
struct Settings {
    krb5_host: String,
    domain: String,
    username: String,
    password: String,
    kdc_hosts: Vec<String>,
    krb5: Option<Krb5Config>,
    port: u16,
    timeout: Duration,
}

impl ClientOption {
    fn apply(self, settings: &mut Settings) -> Result<()> {
        match self {
            Self::Krb5ConfigText(text) => settings.krb5 = Some(text.parse()?),
            Self::Krb5ConfigFile(path) => settings.krb5 = Some(Krb5Config::from_file(&path)?),
            Self::Krb5ConfigData { domain, kdcs } => {
                settings.krb5 = Some(Krb5Config::from_domain(&domain, kdcs.as_slice())?);
            }
            Self::KdcHosts(hosts) => {
                if hosts.is_empty() {
                    return Err(WinDnsError::configuration("no kdcs specified"));
                }
                settings.kdc_hosts = hosts;
            }
            Self::Port(port) => {
                if port == 0 {
                    return Err(WinDnsError::configuration("port must be non-zero"));
                }
                settings.port = port;
            }
            Self::Timeout(timeout) => {
                if timeout.is_zero() {
                    return Err(WinDnsError::configuration("timeout must be non-zero"));
                }
                settings.timeout = timeout;
            }
        }
        Ok(())
    }
}

/// Result of [`Client::negotiate_context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Key name of the new context
    pub key_name: String,
    /// Error from releasing the previous context, if that failed
    pub stale_teardown_error: Option<WinDnsError>,
}

/// Result of [`Client::lookup`].
#[derive(Debug, Clone)]
pub struct LookupResult {
    /// First RDATA field of the first answer, dot-trimmed; empty without answers
    pub value: String,
    /// The underlying exchange
    pub exchange: ExchangeResult,
}

impl LookupResult {
    /// The value, or the exchange's error.
    ///
    /// # Errors
    ///
    /// Returns the error classified by the exchange, if any.
    pub fn into_value(self) -> Result<String> {
        match self.exchange.error() {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// Secure dynamic update client for one set of credentials.
///
/// Cloning is cheap and clones share the security context.
#[derive(Clone)]
pub struct Client {
    settings: Arc<Settings>,
    mechanism: Arc<dyn GssMechanism>,
    transport: Arc<dyn DnsTransport>,
    context: Arc<Mutex<Option<SecurityContext>>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("krb5_host", &self.settings.krb5_host)
            .field("domain", &self.settings.domain)
            .field("username", &self.settings.username)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client using the UDP/TCP network transport. No context is
    /// negotiated yet.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for missing credentials or a failing option.
    pub fn new(
        config: ClientConfig,
        options: Vec<ClientOption>,
        mechanism: Arc<dyn GssMechanism>,
    ) -> Result<Self> {
        let settings = Self::settings(config, options)?;
        let transport = Arc::new(NetTransport::new(settings.port));
        Ok(Self::assemble(settings, mechanism, transport))
    }

    /// Build a client that sends through `transport`.
    ///
    /// # Errors
    ///
    /// See [`Client::new`].
    pub fn with_transport(
        config: ClientConfig,
        options: Vec<ClientOption>,
        mechanism: Arc<dyn GssMechanism>,
        transport: Arc<dyn DnsTransport>,
    ) -> Result<Self> {
        let settings = Self::settings(config, options)?;
        Ok(Self::assemble(settings, mechanism, transport))
    }

    /// Build a client and negotiate its first context.
    ///
    /// # Errors
    ///
    /// Returns construction errors, then negotiation errors.
    pub async fn connect(
        config: ClientConfig,
        options: Vec<ClientOption>,
        mechanism: Arc<dyn GssMechanism>,
    ) -> Result<Self> {
        let client = Self::new(config, options, mechanism)?;
        client.negotiate_context().await?;
        Ok(client)
    }

    fn settings(config: ClientConfig, options: Vec<ClientOption>) -> Result<Settings> {
        config.validate()?;

        let mut settings = Settings {
            krb5: None,
            kdc_hosts: config.kdc_hosts,
            port: config.port,
            timeout: Duration::from_secs(config.timeout_secs),
            krb5_host: config.krb5_host,
            domain: config.domain,
            username: config.username,
            password: config.password,
        };
        if let Some(text) = config.krb5_config {
            ClientOption::Krb5ConfigText(text).apply(&mut settings)?;
        }
        for option in options {
            option.apply(&mut settings)?;
        }
        Ok(settings)
    }

    fn assemble(
        settings: Settings,
        mechanism: Arc<dyn GssMechanism>,
        transport: Arc<dyn DnsTransport>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            mechanism,
            transport,
            context: Arc::new(Mutex::new(None)),
        }
    }

    /// Default per-exchange deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// The explicit krb5 configuration, if one was supplied.
    #[must_use]
    pub fn krb5_config(&self) -> Option<&Krb5Config> {
        self.settings.krb5.as_ref()
    }

    /// Negotiate a new security context, replacing the current one.
    ///
    /// The previous context is torn down first; a failure there is logged and
    /// returned in [`Negotiated::stale_teardown_error`] but does not stop the
    /// new negotiation.
    ///
    /// # Errors
    ///
    /// Returns the negotiation error. The client then has no live context.
    pub async fn negotiate_context(&self) -> Result<Negotiated> {
        let mut guard = self.context.lock().await;

        let stale_teardown_error = match guard.take() {
            Some(mut old) => match old.teardown() {
                Ok(()) => None,
                Err(err) => {
                    warn!(
                        "Failed to release security context {}, continuing: {}",
                        old.key_name(),
                        err
                    );
                    Some(err)
                }
            },
            None => None,
        };

        let params = NegotiationParams {
            server_host: self.settings.krb5_host.clone(),
            realm: self.settings.domain.clone(),
            username: self.settings.username.clone(),
            password: self.settings.password.clone(),
            kdc_hosts: self.settings.kdc_hosts.clone(),
            krb5: self.settings.krb5.clone(),
        };
        let context = negotiate(
            self.mechanism.as_ref(),
            self.transport.as_ref(),
            &params,
            self.settings.timeout,
        )
        .await?;

        let key_name = context.key_name().to_string();
        *guard = Some(context);

        Ok(Negotiated {
            key_name,
            stale_teardown_error,
        })
    }

    /// Tear down the current context.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::NoContext`] if no context is live, or the release
    /// error from the mechanism.
    pub async fn cleanup(&self) -> Result<()> {
        let mut guard = self.context.lock().await;
        let mut context = guard.take().ok_or(WinDnsError::NoContext)?;
        context.teardown()
    }

    /// Key name of the live context, for diagnostics.
    pub async fn keyname(&self) -> Option<String> {
        self.context
            .lock()
            .await
            .as_ref()
            .map(|c| c.key_name().to_string())
    }

    /// Sign `message` with the live context.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::NoContext`] if no context is live.
    pub async fn sign(&self, message: Message) -> Result<SignedMessage> {
        Ok(self.sign_with_session(message).await?.0)
    }

    async fn sign_with_session(
        &self,
        message: Message,
    ) -> Result<(SignedMessage, Arc<dyn GssSession>)> {
        let guard = self.context.lock().await;
        let context = guard.as_ref().ok_or(WinDnsError::NoContext)?;
        let signed = context.sign(message)?;
        Ok((signed, context.session()))
    }

    /// Sign and send `message` to `host` with the default deadline.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::NoContext`] without a live context. Failures after
    /// the message is sent are reported through the returned [`ExchangeResult`].
    pub async fn exchange(&self, host: &str, message: Message) -> Result<ExchangeResult> {
        self.exchange_with_deadline(host, message, self.settings.timeout)
            .await
    }

    /// Sign and send `message` to `host`, giving up after `deadline`.
    ///
    /// # Errors
    ///
    /// See [`Client::exchange`].
    pub async fn exchange_with_deadline(
        &self,
        host: &str,
        message: Message,
        deadline: Duration,
    ) -> Result<ExchangeResult> {
        let (signed, session) = self.sign_with_session(message).await?;
        debug!(
            "Sending message {} to {} signed with {}",
            signed.message().id(),
            host,
            signed.key_name()
        );
        Ok(exchange(
            self.transport.as_ref(),
            host,
            &signed,
            session.as_ref(),
            deadline,
        )
        .await)
    }

    /// Add the records described by `requests` to `zone`.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::RecordFormat`] for the first unparsable request,
    /// before anything is sent.
    pub async fn insert<S: AsRef<str>>(
        &self,
        host: &str,
        zone: &str,
        requests: &[S],
    ) -> Result<ExchangeResult> {
        let message = build_update(zone, requests, &[] as &[&str])?;
        self.exchange(host, message).await
    }

    /// Delete the records described by `requests` from `zone`.
    ///
    /// # Errors
    ///
    /// See [`Client::insert`].
    pub async fn remove<S: AsRef<str>>(
        &self,
        host: &str,
        zone: &str,
        requests: &[S],
    ) -> Result<ExchangeResult> {
        let message = build_update(zone, &[] as &[&str], requests)?;
        self.exchange(host, message).await
    }

    /// Replace `old` with `new` in one UPDATE; removals are applied first.
    ///
    /// # Errors
    ///
    /// See [`Client::insert`].
    pub async fn update<O: AsRef<str>, N: AsRef<str>>(
        &self,
        host: &str,
        zone: &str,
        old: &[O],
        new: &[N],
    ) -> Result<ExchangeResult> {
        let message = build_update(zone, new, old)?;
        self.exchange(host, message).await
    }

    /// Query `qname` (type ANY) and return the first answer's value.
    ///
    /// # Errors
    ///
    /// Returns pre-send errors only; see [`LookupResult::into_value`].
    pub async fn lookup(&self, host: &str, qname: &str) -> Result<LookupResult> {
        let message = build_query(qname)?;
        let exchange = self.exchange(host, message).await?;

        let value = exchange
            .response
            .as_ref()
            .and_then(|response| response.answers().first())
            .and_then(|answer| rdata_field(answer, 1))
            .map(|field| field.trim_matches('.').to_string())
            .unwrap_or_default();

        if exchange.is_success() {
            info!("Lookup of {} on {} returned {:?}", qname, host, value);
        }
        Ok(LookupResult { value, exchange })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
