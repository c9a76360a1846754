// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record request strings.
//!
//! The facade describes each record as a master-file style line,
//! `"<owner-fqdn> <ttl> <TYPE> <value>"`, which the update composer parses back
//! into a resource record.

/// Make `name` fully qualified by enforcing exactly one trailing dot.
#[must_use]
pub fn fqdn(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

/// Join a record name and its zone into a fully qualified owner name.
///
/// Leading and trailing dots on either side are ignored, so `"test."` and
/// `".example.com"` join to `"test.example.com."`. An empty name or `"@"`
/// refers to the zone apex.
#[must_use]
pub fn fqdn_join(name: &str, zone: &str) -> String {
    let name = name.trim_matches('.');
    let zone = zone.trim_matches('.');

    match (name, zone) {
        ("" | "@", _) => fqdn(zone),
        (_, "") => fqdn(name),
        _ => fqdn(&format!("{name}.{zone}")),
    }
}

/// Build the request string for one record.
#[must_use]
pub fn build_request(name: &str, zone: &str, ttl: u32, rr_type: &str, value: &str) -> String {
    format!(
        "{} {ttl} {} {value}",
        fqdn_join(name, zone),
        rr_type.to_uppercase()
    )
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod request_tests;
