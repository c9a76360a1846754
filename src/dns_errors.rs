// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for secure dynamic DNS operations.
//!
//! Every public operation reports failures through [`WinDnsError`]. The variants
//! follow the lifecycle of a request:
//! - Configuration and record format errors are raised before any network activity
//! - Authentication errors come from GSS negotiation or signature verification
//! - Network, timeout and empty-response errors describe a failed round trip
//! - Protocol errors carry the response code the server returned

use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = WinDnsError> = std::result::Result<T, E>;

/// Errors that can occur while negotiating a security context or exchanging
/// signed messages with a DNS server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WinDnsError {
    /// Missing or invalid client configuration
    ///
    /// Returned for empty credential fields, unparsable krb5 configuration text,
    /// or an empty KDC list where at least one KDC is required.
    #[error("Invalid client configuration: {reason}")]
    Configuration {
        /// Explanation of what is invalid
        reason: String,
    },

    /// Kerberos/GSS negotiation was rejected or a response signature did not verify
    ///
    /// Typical causes are bad credentials, clock skew between client and KDC,
    /// or the server refusing the TKEY exchange.
    #[error("GSS authentication with {server} failed: {reason}")]
    Authentication {
        /// The DNS server (or KDC) that rejected the negotiation
        server: String,
        /// Specific reason for the failure
        reason: String,
    },

    /// A request string could not be parsed into a resource record
    #[error("Invalid resource record '{record}': {reason}")]
    RecordFormat {
        /// The offending request string
        record: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// An operation required a signature but no security context is live
    #[error("No live security context; negotiate a context before signing")]
    NoContext,

    /// Socket or connection failure during negotiation or exchange
    #[error("Network exchange with {server} failed: {reason}")]
    Network {
        /// The DNS server (IP:port) that could not be reached
        server: String,
        /// Reason for the connection failure
        reason: String,
    },

    /// The round trip did not complete before the deadline
    #[error("Exchange with {server} timed out after {timeout_ms}ms")]
    Timeout {
        /// The DNS server that did not answer in time
        server: String,
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// The server answered with a non-success response code
    #[error("DNS error: {name} ({code})")]
    Protocol {
        /// Numeric response code
        code: u16,
        /// Symbolic response code name (e.g. "REFUSED")
        name: String,
    },

    /// The transport completed but no usable response message came back
    #[error("Server {server} returned an empty response")]
    EmptyResponse {
        /// The DNS server that returned nothing
        server: String,
    },
}

impl WinDnsError {
    /// Returns true if this error is transient and the caller may retry.
    ///
    /// Nothing in this crate retries on its own; this only helps callers compose
    /// their own retry policy.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::EmptyResponse { .. } => true,
            // SERVFAIL is the only response code worth retrying as-is
            Self::Protocol { code, .. } => <ResponseCode as From<u16>>::from(*code) == ResponseCode::ServFail,
            Self::Configuration { .. }
            | Self::Authentication { .. }
            | Self::RecordFormat { .. }
            | Self::NoContext => false,
        }
    }

    /// Returns a stable reason code for this error, suitable for logs and metrics labels.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::Authentication { .. } => "AuthenticationError",
            Self::RecordFormat { .. } => "RecordFormatError",
            Self::NoContext => "NoContextError",
            Self::Network { .. } => "NetworkError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Protocol { .. } => "ProtocolError",
            Self::EmptyResponse { .. } => "EmptyResponseError",
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn record_format(record: impl Into<String>, reason: impl ToString) -> Self {
        Self::RecordFormat {
            record: record.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn authentication(server: impl Into<String>, reason: impl ToString) -> Self {
        Self::Authentication {
            server: server.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn network(server: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            server: server.into(),
            reason: reason.to_string(),
        }
    }
}

/// Mnemonic of a DNS response code (`NOTAUTH`, `BADSIG`, ...), including the
/// TSIG/TKEY extended codes.
#[must_use]
pub fn rcode_name(code: u16) -> String {
    match <ResponseCode as From<u16>>::from(code) {
        ResponseCode::Unknown(_) => "UNKNOWN".to_string(),
        known => format!("{known:?}").to_ascii_uppercase(),
    }
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
