// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 UPDATE and query message composition.
//!
//! An [`UpdateRequest`] collects records to remove and records to add under one
//! zone. All removals are encoded before all insertions, so a replace expressed
//! as "remove old, add new" is applied atomically by the server.

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, Record, RecordType};
use std::str::FromStr;

use crate::dns_errors::{Result, WinDnsError};
use crate::record::parse_record;
use crate::request::fqdn;

/// One desired mutation of a zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Zone the update is scoped to
    pub zone: String,
    /// Records to insert, in order
    pub adds: Vec<String>,
    /// Records to delete, in order
    pub removes: Vec<String>,
}

impl UpdateRequest {
    /// Start an empty update for `zone`.
    #[must_use]
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.to_string(),
            ..Self::default()
        }
    }

    /// Queue a record insertion.
    #[must_use]
    pub fn add(mut self, request: impl Into<String>) -> Self {
        self.adds.push(request.into());
        self
    }

    /// Queue a record deletion.
    #[must_use]
    pub fn remove(mut self, request: impl Into<String>) -> Self {
        self.removes.push(request.into());
        self
    }

    /// Parse every request and build the unsigned UPDATE message.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::RecordFormat`] for the first request that does not
    /// parse, or a configuration error if the zone is not a valid name. No
    /// message is produced in either case.
    pub fn build(&self) -> Result<Message> {
        build_update(&self.zone, &self.adds, &self.removes)
    }
}

/// Build an unsigned UPDATE message for `zone`.
///
/// # Errors
///
/// See [`UpdateRequest::build`].
pub fn build_update<A, R>(zone: &str, adds: &[A], removes: &[R]) -> Result<Message>
where
    A: AsRef<str>,
    R: AsRef<str>,
{
    let origin = Name::from_str(&fqdn(zone))
        .map_err(|e| WinDnsError::configuration(format!("invalid zone name {zone}: {e}")))?;

    // parse everything before touching the message
    let removals = removes
        .iter()
        .map(|r| parse_record(r.as_ref()).map(into_removal))
        .collect::<Result<Vec<Record>>>()?;
    let additions = adds
        .iter()
        .map(|r| parse_record(r.as_ref()))
        .collect::<Result<Vec<Record>>>()?;

    let mut zone_query = Query::new();
    zone_query
        .set_name(origin)
        .set_query_class(DNSClass::IN)
        .set_query_type(RecordType::SOA);

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .set_recursion_desired(false);
    message.add_query(zone_query);
    message.add_name_servers(removals);
    message.add_name_servers(additions);

    Ok(message)
}

/// RFC 2136 section 2.5.4: delete an RR from an RRset uses class NONE and TTL 0.
fn into_removal(mut record: Record) -> Record {
    record.set_dns_class(DNSClass::NONE).set_ttl(0);
    record
}

/// Build an unsigned ANY query for `qname`.
///
/// # Errors
///
/// Returns a record format error if `qname` is not a valid name.
pub fn build_query(qname: &str) -> Result<Message> {
    let name = Name::from_str(&fqdn(qname))
        .map_err(|e| WinDnsError::record_format(qname, format!("invalid query name: {e}")))?;

    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);
    message.add_query(Query::query(name, RecordType::ANY));
    Ok(message)
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod update_tests;
