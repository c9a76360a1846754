// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TXT record management.

use hickory_proto::rr::RecordType;

use crate::client::Client;
use crate::dns_errors::Result;
use crate::exchange::ExchangeResult;

/// Quote `text` as one TXT character-string.
fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Client {
    /// Add a TXT record holding `text` as a single string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::dns_errors::WinDnsError::NoContext`] without a live context.
    pub async fn insert_txt(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        text: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.insert_record(RecordType::TXT, name, host, zone, &quote(text), ttl)
            .await
    }

    /// Delete the TXT record holding `text`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::dns_errors::WinDnsError::NoContext`] without a live context.
    pub async fn remove_txt(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        text: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.remove_record(RecordType::TXT, name, host, zone, &quote(text), ttl)
            .await
    }

    /// Replace the TXT record holding `old_text` with one holding `new_text`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::dns_errors::WinDnsError::NoContext`] without a live context.
    pub async fn update_txt(
        &self,
        name: &str,
        host: &str,
        zone: &str,
        old_text: &str,
        new_text: &str,
        ttl: u32,
    ) -> Result<ExchangeResult> {
        self.update_record(
            RecordType::TXT,
            name,
            host,
            zone,
            &quote(old_text),
            &quote(new_text),
            ttl,
        )
        .await
    }
}
