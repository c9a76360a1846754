// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TKEY messages for GSS-API key exchange (RFC 2930, RFC 3645).
//!
//! Each negotiation round sends the initiator's token in a TKEY record placed in
//! the additional section of a `<key-name> ANY TKEY` query. The server answers
//! with a TKEY record in the answer section whose key data is its own token.
//! hickory has no TKEY type, so the record travels as opaque RDATA.

use hickory_proto::error::{ProtoError, ProtoResult};
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::NULL;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use std::str::FromStr;

use crate::constants::{RR_TYPE_TKEY, TKEY_LIFETIME_SECS, TKEY_MODE_GSSAPI};
use crate::dns_errors::{rcode_name, Result, WinDnsError};
use crate::tsig::gss_tsig_algorithm;

/// TKEY RDATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TkeyRecord {
    /// Algorithm, always `gss-tsig.` here
    pub algorithm: Name,
    /// Start of the key validity period (32-bit Unix time)
    pub inception: u32,
    /// End of the key validity period (32-bit Unix time)
    pub expiration: u32,
    /// Key agreement mode; 3 is GSS-API negotiation
    pub mode: u16,
    /// Extended error code, 0 on success
    pub error: u16,
    /// GSS token
    pub key: Vec<u8>,
    /// Other data, unused by GSS-API mode
    pub other: Vec<u8>,
}

/// The TKEY record type.
#[must_use]
pub fn tkey_record_type() -> RecordType {
    RecordType::Unknown(RR_TYPE_TKEY)
}

impl TkeyRecord {
    /// A GSS-API mode record carrying `token`, valid from `now` for the key lifetime.
    #[must_use]
    pub fn gss(token: &[u8], now: u64) -> Self {
        // 32-bit serial time; wraps in 2106
        let inception = u32::try_from(now & u64::from(u32::MAX)).unwrap_or_default();
        Self {
            algorithm: gss_tsig_algorithm(),
            inception,
            expiration: inception.wrapping_add(TKEY_LIFETIME_SECS),
            mode: TKEY_MODE_GSSAPI,
            error: 0,
            key: token.to_vec(),
            other: Vec::new(),
        }
    }

    /// Decode TKEY RDATA.
    ///
    /// # Errors
    ///
    /// Returns an error if the RDATA is truncated or has trailing bytes.
    pub fn decode(rdata: &[u8]) -> ProtoResult<Self> {
        let mut decoder = BinDecoder::new(rdata);
        let algorithm = Name::read(&mut decoder)?;
        let inception = decoder.read_u32()?.unverified();
        let expiration = decoder.read_u32()?.unverified();
        let mode = decoder.read_u16()?.unverified();
        let error = decoder.read_u16()?.unverified();
        let key_len = decoder.read_u16()?.unverified();
        let key = decoder.read_vec(usize::from(key_len))?.unverified();
        let other_len = decoder.read_u16()?.unverified();
        let other = decoder.read_vec(usize::from(other_len))?.unverified();
        if !decoder.is_empty() {
            return Err(ProtoError::from("trailing bytes after TKEY record"));
        }

        Ok(Self {
            algorithm,
            inception,
            expiration,
            mode,
            error,
            key,
            other,
        })
    }

    /// Encode as RDATA.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or other data exceeds 65535 bytes.
    pub fn encode(&self) -> ProtoResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(32 + self.key.len());
        {
            let mut encoder = BinEncoder::new(&mut buf);
            self.algorithm.emit_as_canonical(&mut encoder, true)?;
            encoder.emit_u32(self.inception)?;
            encoder.emit_u32(self.expiration)?;
            encoder.emit_u16(self.mode)?;
            encoder.emit_u16(self.error)?;
            for data in [&self.key, &self.other] {
                let len = u16::try_from(data.len())
                    .map_err(|_| ProtoError::from("TKEY data exceeds 65535 bytes"))?;
                encoder.emit_u16(len)?;
                encoder.emit_vec(data)?;
            }
        }
        Ok(buf)
    }

    /// A class ANY, TTL 0 TKEY record owned by `key_name`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`TkeyRecord::encode`].
    pub fn into_record(self, key_name: Name) -> ProtoResult<Record> {
        let rdata = RData::Unknown {
            code: tkey_record_type(),
            rdata: NULL::with(self.encode()?),
        };
        let mut record = Record::from_rdata(key_name, 0, rdata);
        record.set_dns_class(DNSClass::ANY);
        Ok(record)
    }

    /// Decode the RDATA of a TKEY record.
    ///
    /// # Errors
    ///
    /// Returns an error if `record` is not a TKEY record or its RDATA is malformed.
    pub fn from_record(record: &Record) -> ProtoResult<Self> {
        match record.data() {
            Some(RData::Unknown { code, rdata }) if *code == tkey_record_type() => {
                Self::decode(rdata.anything())
            }
            _ => Err(ProtoError::from(format!(
                "{} {} is not a TKEY record",
                record.name(),
                record.record_type()
            ))),
        }
    }
}

/// Generate a fresh key name of the form `<random>.sig-<host>.`.
///
/// # Errors
///
/// Returns a configuration error if `host` does not form a valid name.
pub fn generate_key_name(host: &str) -> Result<Name> {
    let host = host.trim_matches('.');
    let serial: u32 = rand::random();
    Name::from_str(&format!("{serial}.sig-{host}."))
        .map_err(|e| WinDnsError::configuration(format!("invalid server host {host}: {e}")))
}

/// A `<key-name> ANY TKEY` message shell.
#[must_use]
pub fn tkey_message(id: u16, key_name: &Name, message_type: MessageType) -> Message {
    let mut query = Query::new();
    query
        .set_name(key_name.clone())
        .set_query_type(tkey_record_type())
        .set_query_class(DNSClass::ANY);

    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(message_type)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(false);
    message.add_query(query);
    message
}

/// Build the wire bytes of one TKEY negotiation query carrying `token`.
///
/// # Errors
///
/// Returns a configuration error if the message cannot be encoded.
pub fn build_tkey_query(key_name: &Name, token: &[u8], now: u64) -> Result<Vec<u8>> {
    let encode_error = |e: ProtoError| {
        WinDnsError::configuration(format!("cannot encode TKEY query for {key_name}: {e}"))
    };

    let mut message = tkey_message(rand::random(), key_name, MessageType::Query);
    message.add_additional(
        TkeyRecord::gss(token, now)
            .into_record(key_name.clone())
            .map_err(encode_error)?,
    );
    message.to_vec().map_err(encode_error)
}

/// Extract the server's TKEY answer for `key_name` from a negotiation reply.
///
/// # Errors
///
/// Returns an authentication error if the reply carries a non-success response
/// code, lacks a TKEY answer for the key, or reports a TKEY error.
pub fn parse_tkey_response(reply: &[u8], key_name: &Name, server: &str) -> Result<TkeyRecord> {
    let message = Message::from_vec(reply)
        .map_err(|e| WinDnsError::authentication(server, format!("unreadable TKEY reply: {e}")))?;

    if message.response_code() != ResponseCode::NoError {
        let code = u16::from(message.response_code());
        return Err(WinDnsError::authentication(
            server,
            format!("TKEY query refused with {} ({code})", rcode_name(code)),
        ));
    }

    let answer = message
        .answers()
        .iter()
        .find(|r| r.record_type() == tkey_record_type() && r.name() == key_name)
        .ok_or_else(|| {
            WinDnsError::authentication(server, format!("no TKEY answer for {key_name}"))
        })?;

    let record =
        TkeyRecord::from_record(answer).map_err(|e| WinDnsError::authentication(server, e))?;

    if record.error != 0 {
        return Err(WinDnsError::authentication(
            server,
            format!("TKEY error {} ({})", rcode_name(record.error), record.error),
        ));
    }
    if record.mode != TKEY_MODE_GSSAPI {
        return Err(WinDnsError::authentication(
            server,
            format!("unexpected TKEY mode {}", record.mode),
        ));
    }

    Ok(record)
}

#[cfg(test)]
#[path = "tkey_tests.rs"]
mod tkey_tests;
