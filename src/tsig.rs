// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! GSS-TSIG message signing and response verification (RFC 3645, RFC 8945).
//!
//! The TSIG record, its to-be-signed bytes and the reply digest all come from
//! hickory's TSIG support. The only GSS-specific part is the MAC itself: the
//! GSS `get_mic` of those bytes, checked on replies with `verify_mic`.

use hickory_proto::error::{ProtoError, ProtoResult};
use hickory_proto::op::{Message, MessageFinalizer, MessageVerifier};
use hickory_proto::rr::dnssec::rdata::tsig::{
    make_tsig_record, message_tbs, signed_bitmessage_to_buf, TsigAlgorithm, TSIG,
};
use hickory_proto::rr::{Name, Record, RecordData};
use hickory_proto::serialize::binary::{BinDecoder, BinEncodable, BinEncoder};
use hickory_proto::xfer::DnsResponse;
use std::sync::Arc;
use tracing::debug;

use crate::constants::{GSS_TSIG_ALGORITHM, TSIG_FUDGE_TIME_SECS};
use crate::dns_errors::{rcode_name, Result, WinDnsError};
use crate::gss::{GssError, GssSession};

/// Current Unix time in seconds.
#[must_use]
pub fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

/// The `gss-tsig.` algorithm name.
#[must_use]
pub fn gss_tsig_algorithm() -> Name {
    // constant, known to be a valid name
    Name::from_ascii(GSS_TSIG_ALGORITHM).unwrap_or_else(|_| TsigAlgorithm::Gss.to_name())
}

/// A message ready for the wire, with its GSS-TSIG record attached.
#[derive(Debug, Clone)]
pub struct SignedMessage {
    message: Message,
    key_name: Name,
    time_signed: u64,
    fudge: u16,
    mac: Vec<u8>,
    wire: Vec<u8>,
}

impl SignedMessage {
    /// The signed message; its TSIG record is in [`Message::signature`].
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Key name the signature was computed with.
    #[must_use]
    pub fn key_name(&self) -> &Name {
        &self.key_name
    }

    /// Signing algorithm identifier.
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        GSS_TSIG_ALGORITHM
    }

    /// Unix time the signature was stamped with.
    #[must_use]
    pub fn time_signed(&self) -> u64 {
        self.time_signed
    }

    /// Allowed clock skew in seconds.
    #[must_use]
    pub fn fudge(&self) -> u16 {
        self.fudge
    }

    /// The MAC, needed to verify the server's signed reply.
    #[must_use]
    pub fn mac(&self) -> &[u8] {
        &self.mac
    }

    /// Encoded message including the TSIG record.
    #[must_use]
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }
}

fn map_gss(key_name: &Name, err: GssError) -> WinDnsError {
    match err {
        GssError::ContextDeleted => WinDnsError::NoContext,
        other => WinDnsError::authentication(key_name.to_string(), other),
    }
}

/// Compute the GSS-TSIG RDATA for `message`.
///
/// `previous_mac` is the request MAC when signing a response; requests pass `None`.
///
/// # Errors
///
/// Returns [`WinDnsError::NoContext`] if the session was deleted, or an
/// authentication error if the message cannot be encoded or the mechanism
/// cannot compute the MIC.
pub fn gss_tsig(
    previous_mac: Option<&[u8]>,
    message: &Message,
    key_name: &Name,
    session: &dyn GssSession,
    time_signed: u64,
) -> Result<TSIG> {
    let pre_tsig = TSIG::new(
        TsigAlgorithm::Gss,
        time_signed,
        TSIG_FUDGE_TIME_SECS,
        Vec::new(),
        message.id(),
        0,
        Vec::new(),
    );
    let tbs = message_tbs(previous_mac, message, &pre_tsig, key_name)
        .map_err(|e| WinDnsError::authentication(key_name.to_string(), e))?;
    let mac = session.get_mic(&tbs).map_err(|e| map_gss(key_name, e))?;
    Ok(pre_tsig.set_mac(mac))
}

/// Sign `message` with the GSS session bound to `key_name`.
///
/// The signature is stamped with `time_signed` and the fixed 300 second fudge.
///
/// # Errors
///
/// Returns a record format error if the message cannot be encoded, and the
/// errors of [`gss_tsig`] otherwise.
pub fn sign_message(
    mut message: Message,
    key_name: &Name,
    session: &dyn GssSession,
    time_signed: u64,
) -> Result<SignedMessage> {
    let tsig = gss_tsig(None, &message, key_name, session, time_signed)?;
    let mac = tsig.mac().to_vec();
    message.add_tsig(make_tsig_record(key_name.clone(), tsig));

    let wire = message
        .to_vec()
        .map_err(|e| WinDnsError::record_format(format!("message {}", message.id()), e))?;

    debug!(
        "Signed message {} with key {} ({} byte MAC)",
        message.id(),
        key_name,
        mac.len()
    );

    Ok(SignedMessage {
        message,
        key_name: key_name.clone(),
        time_signed,
        fudge: TSIG_FUDGE_TIME_SECS,
        mac,
        wire,
    })
}

/// Extended error code carried in a TSIG record.
///
/// # Errors
///
/// Returns an error if the record cannot be re-read.
pub fn tsig_error(tsig: &TSIG) -> ProtoResult<u16> {
    let mut rdata = Vec::new();
    tsig.emit(&mut BinEncoder::new(&mut rdata))?;

    let mut decoder = BinDecoder::new(&rdata);
    TsigAlgorithm::read(&mut decoder)?;
    // time signed and fudge
    decoder.read_slice(8)?;
    let mac_len = decoder.read_u16()?.unverified();
    // MAC and original id
    decoder.read_slice(usize::from(mac_len) + 2)?;
    Ok(decoder.read_u16()?.unverified())
}

/// Verify the TSIG record that ends a signed reply.
///
/// Returns the reply's TSIG RDATA once the signature checks out.
///
/// # Errors
///
/// Returns an authentication error when the reply is not signed with
/// `key_name`, the server reports a TSIG error, the timestamp falls outside the
/// fudge window, or the MIC does not verify.
pub fn verify_response(
    reply: &[u8],
    request_mac: &[u8],
    key_name: &Name,
    session: &dyn GssSession,
    now: u64,
    server: &str,
) -> Result<TSIG> {
    let (tbs, record) = signed_bitmessage_to_buf(Some(request_mac), reply, true)
        .map_err(|e| WinDnsError::authentication(server, format!("unreadable TSIG: {e}")))?;
    let tsig = record
        .data()
        .and_then(TSIG::try_borrow)
        .ok_or_else(|| WinDnsError::authentication(server, "TSIG record carries no RDATA"))?;

    if record.name() != key_name {
        return Err(WinDnsError::authentication(
            server,
            format!("reply signed with key {}, expected {key_name}", record.name()),
        ));
    }
    if *tsig.algorithm() != TsigAlgorithm::Gss {
        return Err(WinDnsError::authentication(
            server,
            format!("reply signed with algorithm {:?}", tsig.algorithm()),
        ));
    }

    let error = tsig_error(tsig)
        .map_err(|e| WinDnsError::authentication(server, format!("unreadable TSIG: {e}")))?;
    if error != 0 {
        return Err(WinDnsError::authentication(
            server,
            format!("server reported TSIG error {} ({error})", rcode_name(error)),
        ));
    }
    if now.abs_diff(tsig.time()) > u64::from(tsig.fudge()) {
        return Err(WinDnsError::authentication(
            server,
            format!(
                "response signed at {} is outside the {}s window around {now}",
                tsig.time(),
                tsig.fudge()
            ),
        ));
    }

    session.verify_mic(&tbs, tsig.mac()).map_err(|e| match e {
        GssError::ContextDeleted => WinDnsError::NoContext,
        other => WinDnsError::authentication(server, format!("response MIC rejected: {other}")),
    })?;

    Ok(tsig.clone())
}

/// [`MessageFinalizer`] signing every message with one GSS context.
///
/// This lets hickory's own request senders carry GSS-TSIG; the returned
/// verifier checks the signed reply against the request MAC.
#[derive(Clone)]
pub struct GssTsigSigner {
    key_name: Name,
    session: Arc<dyn GssSession>,
}

impl std::fmt::Debug for GssTsigSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GssTsigSigner")
            .field("key_name", &self.key_name)
            .finish_non_exhaustive()
    }
}

impl GssTsigSigner {
    /// Signer for `key_name` backed by `session`.
    #[must_use]
    pub fn new(key_name: Name, session: Arc<dyn GssSession>) -> Self {
        Self { key_name, session }
    }

    /// TSIG key name.
    #[must_use]
    pub fn key_name(&self) -> &Name {
        &self.key_name
    }
}

impl MessageFinalizer for GssTsigSigner {
    fn finalize_message(
        &self,
        message: &Message,
        current_time: u32,
    ) -> ProtoResult<(Vec<Record>, Option<MessageVerifier>)> {
        let tsig = gss_tsig(
            None,
            message,
            &self.key_name,
            self.session.as_ref(),
            u64::from(current_time),
        )
        .map_err(|e| ProtoError::from(e.to_string()))?;

        let request_mac = tsig.mac().to_vec();
        let signer = self.clone();
        let verifier: MessageVerifier = Box::new(move |reply: &[u8]| {
            verify_response(
                reply,
                &request_mac,
                &signer.key_name,
                signer.session.as_ref(),
                unix_now(),
                &signer.key_name.to_string(),
            )
            .map_err(|e| ProtoError::from(e.to_string()))?;
            Ok(DnsResponse::new(Message::from_vec(reply)?, reply.to_vec()))
        });

        Ok((
            vec![make_tsig_record(self.key_name.clone(), tsig)],
            Some(verifier),
        ))
    }

    // GSS-TSIG signs queries as well as updates
    fn should_finalize_message(&self, _message: &Message) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "tsig_tests.rs"]
mod tsig_tests;
