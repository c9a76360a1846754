// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CNAME record management.
//!
//! Targets are always sent fully qualified.

use hickory_proto::rr::RecordType;

use crate::client::Client;
use crate::dns_errors::Result;
use crate::exchange::ExchangeResult;
use crate::request::fqdn;

impl Client {
    /// Add a CNAME record pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns a record format error if `target` is not a valid name.
    pub async fn insert_cname(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        target: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.insert_record(RecordType::CNAME, name, host, zone, &fqdn(target), ttl)
            .await
    }

    /// Delete the CNAME record pointing at `target`.
    ///
    /// # Errors
    ///
    /// Returns a record format error if `target` is not a valid name.
    pub async fn remove_cname(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        target: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.remove_record(RecordType::CNAME, name, host, zone, &fqdn(target), ttl)
            .await
    }

    /// Repoint a CNAME record from `old_target` to `new_target`.
    ///
    /// # Errors
    ///
    /// Returns a record format error if either target is not a valid name.
    pub async fn update_cname(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        old_target: &str,
        new_target: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.update_record(
            RecordType::CNAME,
            name,
            host,
            zone,
            &fqdn(old_target),
            &fqdn(new_target),
            ttl,
        )
        .await
    }
}
