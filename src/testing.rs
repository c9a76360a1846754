// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::dnssec::rdata::tsig::make_tsig_record;
use hickory_proto::rr::Name;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::dns_errors::{Result, WinDnsError};
use crate::gss::{ContextRequest, ContextStep, GssError, GssInitiator, GssMechanism, GssSession};
use crate::tkey::{tkey_message, tkey_record_type, TkeyRecord};
use crate::transport::DnsTransport;
use crate::tsig::{gss_tsig, unix_now};

/// Keyed FNV-1a digest standing in for a Kerberos MIC.
pub(crate) struct FakeSession {
    key: u64,
    deleted: AtomicBool,
}

impl FakeSession {
    pub(crate) fn new(key: u64) -> Self {
        Self {
            key,
            deleted: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    fn digest(&self, message: &[u8]) -> Vec<u8> {
        let mut hash = 0xcbf2_9ce4_8422_2325_u64 ^ self.key;
        for byte in message {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash.to_be_bytes().to_vec()
    }
}

impl GssSession for FakeSession {
    fn get_mic(&self, message: &[u8]) -> Result<Vec<u8>, GssError> {
        if self.is_deleted() {
            return Err(GssError::ContextDeleted);
        }
        Ok(self.digest(message))
    }

    fn verify_mic(&self, message: &[u8], mic: &[u8]) -> Result<(), GssError> {
        if self.digest(message) == mic {
            Ok(())
        } else {
            Err(GssError::Rejected("bad MIC".to_string()))
        }
    }

    fn delete(&self) -> Result<(), GssError> {
        self.deleted.store(true, Ordering::SeqCst);
        Ok(())
    }
}

type Responder = dyn Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync;

/// Transport that records every request and answers through a closure.
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
    pub(crate) requests: Arc<Mutex<Vec<Vec<u8>>>>,
    respond: Arc<Responder>,
}

impl ScriptedTransport {
    pub(crate) fn new(respond: impl Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync + 'static) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            respond: Arc::new(respond),
        }
    }

    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsTransport for ScriptedTransport {
    async fn send(&self, _server: &str, request: &[u8]) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(request.to_vec());
        (self.respond)(request)
    }
}

/// Two-leg mechanism: sends one token, completes on the server's reply.
pub(crate) struct FakeMechanism {
    pub(crate) password: String,
    pub(crate) requests: Arc<Mutex<Vec<ContextRequest>>>,
}

impl FakeMechanism {
    pub(crate) fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl GssMechanism for FakeMechanism {
    async fn initiate(&self, request: &ContextRequest) -> Result<Box<dyn GssInitiator>, GssError> {
        self.requests.lock().unwrap().push(request.clone());
        if request.password != self.password {
            return Err(GssError::Rejected("preauthentication failed".to_string()));
        }
        Ok(Box::new(FakeInitiator { sent: false, done: false }))
    }
}

struct FakeInitiator {
    sent: bool,
    done: bool,
}

impl GssInitiator for FakeInitiator {
    fn step(&mut self, input: Option<&[u8]>) -> Result<ContextStep, GssError> {
        match (self.sent, input) {
            (false, None) => {
                self.sent = true;
                Ok(ContextStep {
                    token: Some(b"ap-req".to_vec()),
                    complete: false,
                })
            }
            (true, Some(b"ap-rep")) => {
                self.done = true;
                Ok(ContextStep {
                    token: None,
                    complete: true,
                })
            }
            _ => Err(GssError::Rejected("unexpected token".to_string())),
        }
    }

    fn into_session(self: Box<Self>) -> Result<Box<dyn GssSession>, GssError> {
        if self.done {
            Ok(Box::new(FakeSession::new(42)))
        } else {
            Err(GssError::Rejected("context incomplete".to_string()))
        }
    }
}

/// Acceptor side of a TKEY round: answer `request` with `token`.
pub(crate) fn tkey_reply(request: &[u8], token: &[u8], error: u16, now: u64) -> Vec<u8> {
    let query = Message::from_vec(request).unwrap();
    let offered = query
        .additionals()
        .iter()
        .find(|r| r.record_type() == tkey_record_type())
        .unwrap();

    let mut record = TkeyRecord::gss(token, now);
    record.error = error;

    let mut reply = tkey_message(query.id(), offered.name(), MessageType::Response);
    reply.add_answer(record.into_record(offered.name().clone()).unwrap());
    reply.to_vec().unwrap()
}

/// Answer TKEY queries with the acceptor token `ap-rep`.
pub(crate) fn tkey_acceptor(request: &[u8]) -> Result<Vec<u8>> {
    Ok(tkey_reply(request, b"ap-rep", 0, unix_now()))
}

/// TKEY queries get the acceptor token, everything else an empty NOERROR reply.
pub(crate) fn mock_server(request: &[u8]) -> Result<Vec<u8>> {
    let query = Message::from_vec(request).map_err(|e| WinDnsError::network("mock", e))?;
    if query
        .additionals()
        .iter()
        .any(|r| r.record_type() == tkey_record_type())
    {
        return tkey_acceptor(request);
    }
    let mut reply = Message::new();
    reply
        .set_id(query.id())
        .set_message_type(MessageType::Response)
        .set_op_code(query.op_code());
    Ok(reply.to_vec().unwrap())
}

/// Decode a signed request; its TSIG record lands in [`Message::signature`].
pub(crate) fn decode_request(request: &[u8]) -> Message {
    Message::from_vec(request).unwrap()
}

/// Server side: sign `reply` over the request MAC.
pub(crate) fn sign_reply(
    mut reply: Message,
    request_mac: &[u8],
    key_name: &Name,
    session: &dyn GssSession,
    time_signed: u64,
) -> Vec<u8> {
    let tsig = gss_tsig(Some(request_mac), &reply, key_name, session, time_signed).unwrap();
    reply.add_tsig(make_tsig_record(key_name.clone(), tsig));
    reply.to_vec().unwrap()
}
