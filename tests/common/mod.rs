// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::dnssec::rdata::tsig::{
    make_tsig_record, signed_bitmessage_to_buf, TsigAlgorithm, TSIG,
};
use hickory_proto::rr::{DNSClass, Name, Record, RecordData};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use windns::dns_errors::{Result, WinDnsError};
use windns::gss::{ContextRequest, ContextStep, GssError, GssInitiator, GssMechanism, GssSession};
use windns::tkey::{tkey_message, tkey_record_type, TkeyRecord};
use windns::transport::DnsTransport;
use windns::tsig::{gss_tsig, unix_now};

/// Route test logs through `RUST_LOG` when set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Mechanism
// ============================================================================

/// Mechanism accepting a single password; contexts take one token round.
pub struct MockMechanism {
    password: String,
    pub initiated: AtomicUsize,
    pub deleted: Arc<AtomicUsize>,
}

impl MockMechanism {
    pub fn new(password: &str) -> Self {
        Self {
            password: password.to_string(),
            initiated: AtomicUsize::new(0),
            deleted: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn deleted_contexts(&self) -> usize {
        self.deleted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GssMechanism for MockMechanism {
    async fn initiate(&self, request: &ContextRequest) -> Result<Box<dyn GssInitiator>, GssError> {
        if request.password != self.password {
            return Err(GssError::Rejected(format!(
                "preauthentication failed for {}@{}",
                request.username, request.realm
            )));
        }
        let serial = self.initiated.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockInitiator {
            serial: u64::try_from(serial).unwrap(),
            state: 0,
            deleted: Arc::clone(&self.deleted),
        }))
    }
}

struct MockInitiator {
    serial: u64,
    state: u8,
    deleted: Arc<AtomicUsize>,
}

impl GssInitiator for MockInitiator {
    fn step(&mut self, input: Option<&[u8]>) -> Result<ContextStep, GssError> {
        match (self.state, input) {
            (0, None) => {
                self.state = 1;
                Ok(ContextStep {
                    token: Some(ap_req(self.serial)),
                    complete: false,
                })
            }
            (1, Some(token)) if token == ACCEPTOR_OUTPUT => {
                self.state = 2;
                Ok(ContextStep {
                    token: None,
                    complete: true,
                })
            }
            _ => Err(GssError::Rejected("unexpected acceptor token".to_string())),
        }
    }

    fn into_session(self: Box<Self>) -> Result<Box<dyn GssSession>, GssError> {
        if self.state != 2 {
            return Err(GssError::Rejected("context incomplete".to_string()));
        }
        Ok(Box::new(MockSession {
            key: self.serial,
            live: AtomicBool::new(true),
            deleted: self.deleted,
        }))
    }
}

const ACCEPTOR_INPUT: &[u8] = b"krb5-ap-req";
const ACCEPTOR_OUTPUT: &[u8] = b"krb5-ap-rep";

/// Initiator token; the session key travels with it so the server can derive it.
fn ap_req(key: u64) -> Vec<u8> {
    let mut token = ACCEPTOR_INPUT.to_vec();
    token.extend_from_slice(&key.to_be_bytes());
    token
}

fn session_key(token: &[u8]) -> Option<u64> {
    let key = token.strip_prefix(ACCEPTOR_INPUT)?;
    Some(u64::from_be_bytes(key.try_into().ok()?))
}

/// Keyed FNV-1a digest in place of a Kerberos MIC.
pub struct MockSession {
    key: u64,
    live: AtomicBool,
    deleted: Arc<AtomicUsize>,
}

impl MockSession {
    /// Acceptor-side session for `key`.
    pub fn keyed(key: u64) -> Self {
        Self {
            key,
            live: AtomicBool::new(true),
            deleted: Arc::new(AtomicUsize::new(0)),
        }
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

impl GssSession for MockSession {
    fn get_mic(&self, message: &[u8]) -> Result<Vec<u8>, GssError> {
        if !self.live.load(Ordering::SeqCst) {
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
        if self.live.swap(false, Ordering::SeqCst) {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Server
// ============================================================================

/// In-memory authoritative server for one zone.
///
/// TKEY queries complete the mock mechanism's context and record its session
/// key under the negotiated key name. Requests must carry a TSIG whose MAC
/// verifies with that key; unsigned ones are refused and bad signatures get
/// NOTAUTH with a TSIG error. Signed UPDATEs are applied to the record set (an
/// insert of an existing record is a no-op), signed queries are answered from
/// it, and every accepted request gets a reply signed over its MAC.
#[derive(Default)]
pub struct MockDnsServer {
    records: Mutex<Vec<Record>>,
    updates: Mutex<Vec<Message>>,
    keys: Mutex<HashMap<Name, u64>>,
    queries: AtomicUsize,
    rejected: AtomicUsize,
    fail_with: Mutex<Option<ResponseCode>>,
    drop_updates: AtomicBool,
    forge_replies: AtomicBool,
}

/// Key and MAC of a request whose signature verified.
struct VerifiedRequest {
    key_name: Name,
    key: u64,
    mac: Vec<u8>,
}

/// TSIG error for a MAC that does not verify (RFC 8945).
const BADSIG: u16 = 16;
/// TSIG error for an unknown key name.
const BADKEY: u16 = 17;

impl MockDnsServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer every later UPDATE or query with `code`.
    pub fn fail_with(&self, code: ResponseCode) {
        *self.fail_with.lock().unwrap() = Some(code);
    }

    /// Stop answering UPDATEs.
    pub fn drop_updates(&self) {
        self.drop_updates.store(true, Ordering::SeqCst);
    }

    /// Sign later replies with a key the client does not hold.
    pub fn forge_replies(&self) {
        self.forge_replies.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<Message> {
        self.updates.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Requests whose signature did not verify.
    pub fn rejected_count(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    /// Handle one request; `None` means no reply is sent.
    pub fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
        let message = Message::from_vec(request).ok()?;
        if let Some(tkey) = message
            .additionals()
            .iter()
            .find(|r| r.record_type() == tkey_record_type())
        {
            return self.accept_context(&message, tkey);
        }

        let mut reply = Message::new();
        reply
            .set_id(message.id())
            .set_message_type(MessageType::Response)
            .set_op_code(message.op_code())
            .add_queries(message.queries().to_vec());

        if message.signature().is_empty() {
            reply.set_response_code(ResponseCode::Refused);
            return reply.to_vec().ok();
        }
        let signer = match self.verify_request(request) {
            Ok(verified) => verified,
            Err((key_name, error)) => {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                return unverified_reply(reply, key_name, error);
            }
        };

        if let Some(code) = *self.fail_with.lock().unwrap() {
            reply.set_response_code(code);
            return self.sign_reply(reply, &signer);
        }

        if message.op_code() == OpCode::Update {
            if self.drop_updates.load(Ordering::SeqCst) {
                return None;
            }
            self.apply(&message);
            self.updates.lock().unwrap().push(message);
        } else {
            self.queries.fetch_add(1, Ordering::SeqCst);
            let records = self.records.lock().unwrap();
            for query in message.queries() {
                let answers = records.iter().filter(|r| r.name() == query.name());
                reply.add_answers(answers.cloned());
            }
        }
        self.sign_reply(reply, &signer)
    }

    fn accept_context(&self, query: &Message, tkey: &Record) -> Option<Vec<u8>> {
        let offered = TkeyRecord::from_record(tkey).ok()?;
        let key = session_key(&offered.key)?;
        self.keys.lock().unwrap().insert(tkey.name().clone(), key);

        let mut reply = tkey_message(query.id(), tkey.name(), MessageType::Response);
        reply.add_answer(
            TkeyRecord::gss(ACCEPTOR_OUTPUT, unix_now())
                .into_record(tkey.name().clone())
                .ok()?,
        );
        reply.to_vec().ok()
    }

    /// Check the request TSIG against the key negotiated for its key name.
    fn verify_request(&self, request: &[u8]) -> Result<VerifiedRequest, (Name, u16)> {
        let Ok((tbs, record)) = signed_bitmessage_to_buf(None, request, true) else {
            return Err((Name::root(), BADSIG));
        };
        let key_name = record.name().clone();
        let Some(tsig) = record.data().and_then(TSIG::try_borrow) else {
            return Err((key_name, BADSIG));
        };
        let Some(key) = self.keys.lock().unwrap().get(&key_name).copied() else {
            return Err((key_name, BADKEY));
        };
        if MockSession::keyed(key).verify_mic(&tbs, tsig.mac()).is_err() {
            return Err((key_name, BADSIG));
        }
        Ok(VerifiedRequest {
            mac: tsig.mac().to_vec(),
            key_name,
            key,
        })
    }

    fn sign_reply(&self, mut reply: Message, signer: &VerifiedRequest) -> Option<Vec<u8>> {
        let key = if self.forge_replies.load(Ordering::SeqCst) {
            signer.key ^ 1
        } else {
            signer.key
        };
        let tsig = gss_tsig(
            Some(&signer.mac),
            &reply,
            &signer.key_name,
            &MockSession::keyed(key),
            unix_now(),
        )
        .ok()?;
        reply.add_tsig(make_tsig_record(signer.key_name.clone(), tsig));
        reply.to_vec().ok()
    }

    fn apply(&self, update: &Message) {
        let mut records = self.records.lock().unwrap();
        for change in update.name_servers() {
            let existing = records.iter().position(|r| same_rr(r, change));
            match (change.dns_class(), existing) {
                (DNSClass::NONE, Some(index)) => {
                    records.remove(index);
                }
                (DNSClass::IN, None) => records.push(change.clone()),
                _ => {}
            }
        }
    }

    /// Serve this zone on a loopback UDP socket.
    pub async fn serve_udp(self: &Arc<Self>) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    break;
                };
                if let Some(reply) = server.handle(&buf[..len]) {
                    let _ = socket.send_to(&reply, peer).await;
                }
            }
        });
        addr
    }
}

fn same_rr(a: &Record, b: &Record) -> bool {
    a.name() == b.name() && a.record_type() == b.record_type() && a.data() == b.data()
}

/// NOTAUTH carrying an unsigned TSIG with `error`.
fn unverified_reply(mut reply: Message, key_name: Name, error: u16) -> Option<Vec<u8>> {
    reply.set_response_code(ResponseCode::NotAuth);
    let tsig = TSIG::new(
        TsigAlgorithm::Gss,
        unix_now(),
        300,
        Vec::new(),
        reply.id(),
        error,
        Vec::new(),
    );
    reply.add_tsig(make_tsig_record(key_name, tsig));
    reply.to_vec().ok()
}

/// In-process transport in front of a [`MockDnsServer`].
#[derive(Clone)]
pub struct MockTransport {
    pub server: Arc<MockDnsServer>,
    pub sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    tamper: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(server: Arc<MockDnsServer>) -> Self {
        Self {
            server,
            sent: Arc::new(Mutex::new(Vec::new())),
            tamper: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flip a header bit of every later request after it was signed.
    pub fn tamper_requests(&self) {
        self.tamper.store(true, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl DnsTransport for MockTransport {
    async fn send(&self, server: &str, request: &[u8]) -> Result<Vec<u8>> {
        let mut request = request.to_vec();
        if self.tamper.load(Ordering::SeqCst) {
            // the RD flag, covered by the MAC
            request[2] ^= 0x01;
        }
        self.sent
            .lock()
            .unwrap()
            .push((server.to_string(), request.clone()));
        match self.server.handle(&request) {
            Some(reply) => Ok(reply),
            // stand-in for a silent server; the exchange deadline fires first
            None => std::future::pending().await,
        }
    }
}

/// Transport whose server is down.
pub struct UnreachableTransport;

#[async_trait]
impl DnsTransport for UnreachableTransport {
    async fn send(&self, server: &str, _request: &[u8]) -> Result<Vec<u8>> {
        Err(WinDnsError::Network {
            server: server.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}
