// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! A and AAAA record management.

use hickory_proto::rr::RecordType;

use crate::client::Client;
use crate::dns_errors::Result;
use crate::exchange::ExchangeResult;

impl Client {
    /// Add an A record.
    ///
    /// # Errors
    ///
    /// Returns a record format error if `ipv4` is not an IPv4 address.
    pub async fn insert_a(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        ipv4: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.insert_record(RecordType::A, name, host, zone, ipv4, ttl)
            .await
    }

    /// Delete an A record.
    ///
    /// # Errors
    ///
    /// Returns a record format error if `ipv4` is not an IPv4 address.
    pub async fn remove_a(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        ipv4: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.remove_record(RecordType::A, name, host, zone, ipv4, ttl)
            .await
    }

    /// Point an A record from `old_ipv4` to `new_ipv4`.
    ///
    /// # Errors
    ///
    /// Returns a record format error if either value is not an IPv4 address.
    pub async fn update_a(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        old_ipv4: &str,
        new_ipv4: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.update_record(RecordType::A, name, host, zone, old_ipv4, new_ipv4, ttl)
            .await
    }

    /// Add an AAAA record.
    ///
    /// # Errors
    ///
    /// Returns a record format error if `ipv6` is not an IPv6 address.
    pub async fn insert_aaaa(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        ipv6: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.insert_record(RecordType::AAAA, name, host, zone, ipv6, ttl)
            .await
    }

    /// Delete an AAAA record.
    ///
    /// # Errors
    ///
    /// Returns a record format error if `ipv6` is not an IPv6 address.
    pub async fn remove_aaaa(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        ipv6: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.remove_record(RecordType::AAAA, name, host, zone, ipv6, ttl)
            .await
    }

    /// Point an AAAA record from `old_ipv6` to `new_ipv6`.
    ///
    /// # Errors
    ///
    /// Returns a record format error if either value is not an IPv6 address.
    pub async fn update_aaaa(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        old_ipv6: &str,
        new_ipv6: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.update_record(RecordType::AAAA, name, host, zone, old_ipv6, new_ipv6, ttl)
            .await
    }
}
