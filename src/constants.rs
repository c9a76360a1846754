// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the windns client.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries and dynamic updates
pub const DNS_PORT: u16 = 53;

/// Default TTL for DNS records (5 minutes)
pub const DEFAULT_DNS_RECORD_TTL_SECS: u32 = 300;

/// Largest request sent over UDP before switching straight to TCP
pub const MAX_UDP_PAYLOAD_LEN: usize = 512;

/// Record type code for TKEY (RFC 2930)
pub const RR_TYPE_TKEY: u16 = 249;

/// DNAME resource record type (RFC 6672)
pub const RR_TYPE_DNAME: u16 = 39;


// ============================================================================
// GSS-TSIG Constants
// ============================================================================

/// Algorithm name used for GSS-TSIG signatures and TKEY negotiation (RFC 3645)
pub const GSS_TSIG_ALGORITHM: &str = "gss-tsig.";

/// TSIG fudge window in seconds (allowed clock skew)
pub const TSIG_FUDGE_TIME_SECS: u16 = 300;

/// TKEY mode for GSS-API negotiation (RFC 2930 section 2.5)
pub const TKEY_MODE_GSSAPI: u16 = 3;

/// Requested lifetime of a negotiated TKEY (1 hour)
pub const TKEY_LIFETIME_SECS: u32 = 3600;

/// Maximum number of GSS token round trips before negotiation is abandoned
pub const MAX_NEGOTIATION_ROUNDS: usize = 5;

/// Service principal prefix for DNS servers
pub const DNS_SERVICE_PRINCIPAL_PREFIX: &str = "DNS/";

// ============================================================================
// Timing Constants
// ============================================================================

/// Default deadline for one network round trip (10 seconds)
pub const DEFAULT_EXCHANGE_TIMEOUT_SECS: u64 = 10;
