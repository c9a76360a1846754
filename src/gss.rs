// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! GSS-API mechanism seam.
//!
//! The Kerberos protocol (AS/TGS exchanges, ticket handling) and the GSS
//! context primitives live behind these traits. A mechanism implementation
//! acquires credentials and produces context tokens; the client carries those
//! tokens to the DNS server in TKEY messages and uses the established session
//! to compute GSS-TSIG signatures.
//!
//! The lifecycle is:
//! 1. [`GssMechanism::initiate`] obtains a ticket for `DNS/<host>`
//! 2. [`GssInitiator::step`] is called until it reports completion, feeding back
//!    each token the server returned
//! 3. [`GssInitiator::into_session`] yields the [`GssSession`] used for MICs
//! 4. [`GssSession::delete`] releases the context

use async_trait::async_trait;
use thiserror::Error;

use crate::constants::DNS_SERVICE_PRINCIPAL_PREFIX;
use crate::krb5::Krb5Config;

/// Errors reported by a GSS mechanism implementation.
#[derive(Error, Debug)]
pub enum GssError {
    /// The KDC or acceptor rejected the credentials or a context token
    #[error("credentials rejected: {0}")]
    Rejected(String),

    /// The KDC could not be reached
    #[error("KDC unreachable: {0}")]
    Unreachable(String),

    /// The context was used after it had been deleted
    #[error("security context has been deleted")]
    ContextDeleted,

    /// Any other failure from the underlying security library
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Parameters for establishing one security context.
#[derive(Clone)]
pub struct ContextRequest {
    /// Target service principal, e.g. `DNS/dc1.example.com`
    pub service_principal: String,
    /// Host the context is established against
    pub server_host: String,
    /// Kerberos realm (uppercased domain)
    pub realm: String,
    /// Principal user name, without realm
    pub username: String,
    /// Password for the principal
    pub password: String,
    /// Realm configuration handed to the mechanism
    pub krb5: Krb5Config,
    /// AD KDCs reject PA-FX-FAST from most clients, so it stays off
    pub disable_pa_fx_fast: bool,
}

impl ContextRequest {
    /// Build a request for `server_host` with the fixed mechanism flags.
    #[must_use]
    pub fn new(
        server_host: &str,
        realm: &str,
        username: &str,
        password: &str,
        krb5: Krb5Config,
    ) -> Self {
        Self {
            service_principal: format!("{DNS_SERVICE_PRINCIPAL_PREFIX}{server_host}"),
            server_host: server_host.to_string(),
            realm: realm.to_uppercase(),
            username: username.to_string(),
            password: password.to_string(),
            krb5,
            disable_pa_fx_fast: true,
        }
    }
}

impl std::fmt::Debug for ContextRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRequest")
            .field("service_principal", &self.service_principal)
            .field("server_host", &self.server_host)
            .field("realm", &self.realm)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("disable_pa_fx_fast", &self.disable_pa_fx_fast)
            .finish_non_exhaustive()
    }
}

/// Output of one `init_sec_context` step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStep {
    /// Token to send to the acceptor, if any
    pub token: Option<Vec<u8>>,
    /// True once the context is fully established
    pub complete: bool,
}

/// Kerberos-backed GSS mechanism.
#[async_trait]
pub trait GssMechanism: Send + Sync {
    /// Acquire credentials for `request.username` and start a context toward
    /// `request.service_principal`.
    ///
    /// # Errors
    ///
    /// Returns [`GssError::Rejected`] for bad credentials and
    /// [`GssError::Unreachable`] when no KDC answers.
    async fn initiate(&self, request: &ContextRequest) -> Result<Box<dyn GssInitiator>, GssError>;
}

/// A context being established.
pub trait GssInitiator: Send {
    /// Process the acceptor's last token (none on the first call).
    ///
    /// # Errors
    ///
    /// Returns an error if the acceptor token is invalid.
    fn step(&mut self, input: Option<&[u8]>) -> Result<ContextStep, GssError>;

    /// Finish establishment and hand over the signing session.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is not complete.
    fn into_session(self: Box<Self>) -> Result<Box<dyn GssSession>, GssError>;
}

/// An established security context.
pub trait GssSession: Send + Sync {
    /// Compute a MIC over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`GssError::ContextDeleted`] once the context was deleted.
    fn get_mic(&self, message: &[u8]) -> Result<Vec<u8>, GssError>;

    /// Verify a MIC produced by the acceptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the MIC does not match or the context was deleted.
    fn verify_mic(&self, message: &[u8], mic: &[u8]) -> Result<(), GssError>;

    /// Release the context state held by the security library.
    ///
    /// # Errors
    ///
    /// Returns an error if the library fails to release the context.
    fn delete(&self) -> Result<(), GssError>;
}
