// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone-file style resource record parsing.
//!
//! Request strings take the form `<owner> [<ttl>] [IN] <TYPE> <rdata...>`, the
//! same shape as a line of a master file. Owner names and names inside RDATA are
//! treated as absolute whether or not they carry a trailing dot, and a missing
//! TTL defaults to 300 seconds.

use hickory_proto::error::ProtoError;
use hickory_proto::rr::rdata::NULL;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::BinEncoder;
use hickory_proto::serialize::txt::Parser;
use std::str::FromStr;

use crate::constants::{DEFAULT_DNS_RECORD_TTL_SECS, RR_TYPE_DNAME};
use crate::dns_errors::{Result, WinDnsError};

/// Parse one request string into a [`Record`].
///
/// The line is read by hickory's master-file parser with the root as origin,
/// so every record type it knows (A, AAAA, CNAME, MX, TXT, SRV, CAA, SOA, ...)
/// is accepted. DNAME, which the parser has no type for, is encoded here.
///
/// # Errors
///
/// Returns [`WinDnsError::RecordFormat`] carrying the whole request string if any
/// part of it is invalid, or if it holds other than exactly one record.
pub fn parse_record(text: &str) -> Result<Record> {
    let line = text.trim();
    let fields: Vec<&str> = line.split_whitespace().collect();
    // the type is the first field after the owner that is neither a TTL nor a class
    let type_at = fields
        .iter()
        .skip(1)
        .position(|f| Parser::parse_time(f).is_err() && parse_class(f).is_err())
        .map(|i| i + 1);
    if let Some(at) = type_at.filter(|&at| fields[at].eq_ignore_ascii_case("DNAME")) {
        return parse_dname(text, &fields, at);
    }

    let zone = format!("$TTL {DEFAULT_DNS_RECORD_TTL_SECS}\n{line}\n");
    let (_, rrsets) = Parser::new(zone, None, Some(Name::root()))
        .parse()
        .map_err(|e| WinDnsError::record_format(text, e))?;

    let mut records = rrsets.into_values().flatten();
    let mut record = match (records.next(), records.next()) {
        (Some(record), None) => record,
        (None, _) => return Err(WinDnsError::record_format(text, "no record data")),
        (Some(_), Some(_)) => {
            return Err(WinDnsError::record_format(text, "expected a single record"))
        }
    };

    // the master-file parser stamps SOA records with their expire field
    if record.record_type() == RecordType::SOA {
        let ttl = fields
            .iter()
            .skip(1)
            .take_while(|f| !f.eq_ignore_ascii_case("SOA"))
            .find_map(|f| Parser::parse_time(f).ok())
            .unwrap_or(DEFAULT_DNS_RECORD_TTL_SECS);
        record.set_ttl(ttl);
    }
    Ok(record)
}

fn parse_class(field: &str) -> std::result::Result<DNSClass, ProtoError> {
    DNSClass::from_str(&field.to_uppercase())
}

/// `<owner> [<ttl>] [<class>] DNAME <target>`, with the type at `fields[at]`.
fn parse_dname(text: &str, fields: &[&str], at: usize) -> Result<Record> {
    let owner = Name::parse(fields[0], Some(&Name::root()))
        .map_err(|e| WinDnsError::record_format(text, e))?;

    let mut ttl = DEFAULT_DNS_RECORD_TTL_SECS;
    let mut class = DNSClass::IN;
    for field in &fields[1..at] {
        if let Ok(value) = Parser::parse_time(field) {
            ttl = value;
        } else {
            class = parse_class(field).map_err(|e| WinDnsError::record_format(text, e))?;
        }
    }

    let target = match &fields[at + 1..] {
        [target] => Name::parse(target, Some(&Name::root()))
            .map_err(|e| WinDnsError::record_format(text, e))?,
        _ => return Err(WinDnsError::record_format(text, "DNAME expects one target name")),
    };
    let mut rdata = Vec::new();
    target
        .emit_as_canonical(&mut BinEncoder::new(&mut rdata), true)
        .map_err(|e| WinDnsError::record_format(text, e))?;

    let mut record = Record::from_rdata(
        owner,
        ttl,
        RData::Unknown {
            code: RecordType::Unknown(RR_TYPE_DNAME),
            rdata: NULL::with(rdata),
        },
    );
    record.set_dns_class(class);
    Ok(record)
}

/// The `index`-th (1-based) whitespace-separated field of a record's RDATA.
///
/// For an A record, field 1 is the address; for MX, field 1 is the preference
/// and field 2 the exchange.
#[must_use]
pub fn rdata_field(record: &Record, index: usize) -> Option<String> {
    let data = record.data()?.to_string();
    index
        .checked_sub(1)
        .and_then(|i| data.split_whitespace().nth(i))
        .map(str::to_string)
}

/// Render a record as a single master-file line.
#[must_use]
pub fn render_record(record: &Record) -> String {
    let data = record.data().map(ToString::to_string).unwrap_or_default();
    format!(
        "{} {} {} {} {}",
        record.name(),
        record.ttl(),
        record.dns_class(),
        record.record_type(),
        data
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod record_tests;
