// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Exchange engine: one signed round trip and the classification of its reply.

use hickory_proto::op::Message;
use hickory_proto::rr::dnssec::rdata::tsig::TSIG;
use hickory_proto::rr::RecordData;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::dns_errors::{rcode_name, Result, WinDnsError};
use crate::gss::GssSession;
use crate::transport::{round_trip, DnsTransport};
use crate::tsig::{tsig_error, unix_now, verify_response, SignedMessage};

/// How a round trip ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server answered NOERROR
    Success,
    /// The server answered with another response code
    Protocol {
        /// Numeric response code
        code: u16,
        /// Symbolic name of the code
        name: String,
    },
    /// No reply was received (socket failure or deadline)
    Transport(WinDnsError),
    /// A reply arrived but was empty or could not be decoded
    EmptyResponse,
    /// The reply's signature did not verify
    Unverified(WinDnsError),
}

/// The result of one network round trip.
///
/// The decoded response is kept even when the outcome is a failure, so callers
/// can log what the server sent back.
#[derive(Debug, Clone)]
pub struct ExchangeResult {
    /// Server the message was sent to
    pub server: String,
    /// Decoded reply, absent on transport failure
    pub response: Option<Message>,
    /// Time from send to full receipt of the reply
    pub rtt: Duration,
    /// Classified outcome
    pub outcome: Outcome,
}

impl ExchangeResult {
    /// True if the server answered NOERROR.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Response code of the reply, if one was decoded.
    #[must_use]
    pub fn response_code(&self) -> Option<u16> {
        self.response
            .as_ref()
            .map(|m| u16::from(m.response_code()))
    }

    /// The error this outcome represents, if any.
    #[must_use]
    pub fn error(&self) -> Option<WinDnsError> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Protocol { code, name } => Some(WinDnsError::Protocol {
                code: *code,
                name: name.clone(),
            }),
            Outcome::Transport(err) | Outcome::Unverified(err) => Some(err.clone()),
            Outcome::EmptyResponse => Some(WinDnsError::EmptyResponse {
                server: self.server.clone(),
            }),
        }
    }

    /// The response on success, the classified error otherwise.
    ///
    /// # Errors
    ///
    /// Returns the error from [`ExchangeResult::error`].
    pub fn into_result(self) -> Result<Message> {
        if let Some(err) = self.error() {
            return Err(err);
        }
        self.response.ok_or(WinDnsError::EmptyResponse {
            server: self.server,
        })
    }

    fn new(server: &str, response: Option<Message>, rtt: Duration, outcome: Outcome) -> Self {
        Self {
            server: server.to_string(),
            response,
            rtt,
            outcome,
        }
    }
}

/// TSIG error code of a signed reply, if it carries a TSIG record.
fn reply_tsig_error(response: &Message) -> Option<u16> {
    response
        .signature()
        .iter()
        .filter_map(|record| record.data().and_then(TSIG::try_borrow))
        .find_map(|tsig| tsig_error(tsig).ok())
}

/// Classify a decoded reply by its response code.
#[must_use]
pub fn classify(response: &Message) -> Outcome {
    let code = u16::from(response.response_code());
    if code == 0 {
        Outcome::Success
    } else {
        Outcome::Protocol {
            code,
            name: rcode_name(code),
        }
    }
}

/// Send `signed` to `server` and classify the reply.
///
/// A reply with a non-success response code is a protocol error whatever its
/// TSIG record says; servers answer a rejected signature with NOTAUTH and an
/// unsigned TSIG. A NOERROR reply that is signed is verified against the
/// request MAC using `session`, an unsigned one is accepted as is. Nothing is
/// retried.
pub async fn exchange(
    transport: &dyn DnsTransport,
    server: &str,
    signed: &SignedMessage,
    session: &dyn GssSession,
    deadline: Duration,
) -> ExchangeResult {
    let started = Instant::now();
    let reply = round_trip(transport, server, signed.wire(), deadline).await;
    let rtt = started.elapsed();

    let bytes = match reply {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Exchange with {} failed after {:?}: {}", server, rtt, err);
            return ExchangeResult::new(server, None, rtt, Outcome::Transport(err));
        }
    };
    if bytes.is_empty() {
        warn!("Empty reply from {}", server);
        return ExchangeResult::new(server, None, rtt, Outcome::EmptyResponse);
    }

    let response = match Message::from_vec(&bytes) {
        Ok(message) => message,
        Err(err) => {
            warn!("Undecodable reply from {}: {}", server, err);
            return ExchangeResult::new(server, None, rtt, Outcome::EmptyResponse);
        }
    };

    if response.id() != signed.message().id() {
        let err = WinDnsError::network(
            server,
            format!(
                "reply id {} does not match request id {}",
                response.id(),
                signed.message().id()
            ),
        );
        return ExchangeResult::new(server, Some(response), rtt, Outcome::Transport(err));
    }

    let outcome = match classify(&response) {
        Outcome::Protocol { code, name } => {
            match reply_tsig_error(&response).filter(|e| *e != 0) {
                Some(tsig) => warn!(
                    "Server {} answered {} ({}) with TSIG error {} ({}) in {:?}",
                    server,
                    name,
                    code,
                    rcode_name(tsig),
                    tsig,
                    rtt
                ),
                None => warn!("Server {} answered {} ({}) in {:?}", server, name, code, rtt),
            }
            Outcome::Protocol { code, name }
        }
        _ if response.signature().is_empty() => Outcome::Success,
        _ => match verify_response(
            &bytes,
            signed.mac(),
            signed.key_name(),
            session,
            unix_now(),
            server,
        ) {
            Ok(_) => Outcome::Success,
            Err(err) => {
                warn!("Reply from {} failed verification: {}", server, err);
                Outcome::Unverified(err)
            }
        },
    };

    if outcome == Outcome::Success {
        debug!("Exchange with {} succeeded in {:?}", server, rtt);
    }

    ExchangeResult::new(server, Some(response), rtt, outcome)
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod exchange_tests;
