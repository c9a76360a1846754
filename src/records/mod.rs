// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-record-type update operations.
//!
//! Each operation builds a `"<owner-fqdn> <ttl> <TYPE> <value>"` request and
//! hands it to [`Client::insert`], [`Client::remove`] or [`Client::update`].
//! The typed modules wrap the generic operations defined here.

pub mod a;
pub mod cname;
pub mod txt;

use hickory_proto::rr::RecordType;
use tracing::info;

use crate::client::Client;
use crate::dns_errors::Result;
use crate::exchange::ExchangeResult;
use crate::request::{build_request, fqdn_join};

impl Client {
    /// Add one record of `rr_type` named `name` in `zone`.
    ///
    /// # Arguments
    /// * `name` - Record name relative to the zone, or `"@"` for the apex
    /// * `host` - DNS server to send the update to
    /// * `zone` - Zone the record belongs to
    /// * `value` - RDATA in master-file syntax
    /// * `ttl` - Time to live in seconds
    ///
    /// # Errors
    ///
    /// Returns a record format error if the record does not parse, or
    /// [`crate::dns_errors::WinDnsError::NoContext`] without a live context.
    pub async fn insert_record(
        &self,
        rr_type: RecordType,
        name: &str,
        host: &str,
        zone: &str,
        value: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        info!(
            "Adding {} record: {} -> {} (TTL: {})",
            rr_type,
            fqdn_join(name, zone),
            value,
            ttl
        );
        let request = build_request(name, zone, ttl, &rr_type.to_string(), value);
        self.insert(host, zone, &[request]).await
    }

    /// Delete one record of `rr_type` named `name` in `zone`.
    ///
    /// Only the record with this exact value is removed; other records of the
    /// RRset stay.
    ///
    /// # Errors
    ///
    /// See [`Client::insert_record`].
    pub async fn remove_record(
        &self,
        rr_type: RecordType,
        name: &str,
        host: &str,
        zone: &str,
        value: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        info!(
            "Deleting {} record: {} -> {}",
            rr_type,
            fqdn_join(name, zone),
            value
        );
        let request = build_request(name, zone, ttl, &rr_type.to_string(), value);
        self.remove(host, zone, &[request]).await
    }

    /// Replace `old_value` with `new_value` in a single UPDATE.
    ///
    /// # Errors
    ///
    /// See [`Client::insert_record`].
    #[allow(clippy::too_many_arguments)]
    pub async fn update_record(
        &self,
        rr_type: RecordType,
        name: &str,
        host: &str,
        zone: &str,
        old_value: &str,
        new_value: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        info!(
            "Updating {} record: {} {} -> {} (TTL: {})",
            rr_type,
            fqdn_join(name, zone),
            old_value,
            new_value,
            ttl
        );
        let rr_type = rr_type.to_string();
        let old = build_request(name, zone, ttl, &rr_type, old_value);
        let new = build_request(name, zone, ttl, &rr_type, new_value);
        self.update(host, zone, &[old], &[new]).await
    }
}
