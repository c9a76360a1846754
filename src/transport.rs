// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Message transport.
//!
//! [`NetTransport`] sends over hickory's UDP stream and falls back to its TCP
//! stream when the reply is truncated or the request does not fit in a plain
//! UDP payload. The [`DnsTransport`] trait lets tests substitute an in-memory
//! server.

use async_trait::async_trait;
use futures::StreamExt;
use hickory_proto::iocompat::AsyncIoTokioAsStd;
use hickory_proto::tcp::TcpStream;
use hickory_proto::udp::UdpStream;
use hickory_proto::xfer::{DnsStreamHandle, SerialMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tracing::debug;

use crate::constants::{DEFAULT_EXCHANGE_TIMEOUT_SECS, DNS_PORT, MAX_UDP_PAYLOAD_LEN};
use crate::dns_errors::{Result, WinDnsError};

/// Carries one encoded request to a server and returns the encoded reply.
#[async_trait]
pub trait DnsTransport: Send + Sync {
    /// Send `request` to `server` and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`WinDnsError::Network`] if the server cannot be reached or the
    /// socket fails.
    async fn send(&self, server: &str, request: &[u8]) -> Result<Vec<u8>>;
}

/// Run one round trip bounded by `deadline`.
///
/// # Errors
///
/// Returns [`WinDnsError::Timeout`] when the deadline passes first, or the
/// transport's own error.
pub async fn round_trip(
    transport: &dyn DnsTransport,
    server: &str,
    request: &[u8],
    deadline: Duration,
) -> Result<Vec<u8>> {
    tokio::time::timeout(deadline, transport.send(server, request))
        .await
        .map_err(|_| WinDnsError::Timeout {
            server: server.to_string(),
            timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        })?
}

/// UDP transport with TCP fallback.
#[derive(Debug, Clone, Copy)]
pub struct NetTransport {
    port: u16,
}

impl Default for NetTransport {
    fn default() -> Self {
        Self::new(DNS_PORT)
    }
}

impl NetTransport {
    /// Transport that talks to `port` on every server.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Destination port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    async fn resolve(&self, server: &str) -> Result<SocketAddr> {
        lookup_host((server, self.port))
            .await
            .map_err(|e| WinDnsError::network(server, e))?
            .next()
            .ok_or_else(|| WinDnsError::network(server, "host has no addresses"))
    }

    async fn send_udp(&self, server: &str, addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>> {
        let (connect, mut handle) = UdpStream::<tokio::net::UdpSocket>::new(addr, None);
        let mut stream = connect
            .await
            .map_err(|e| WinDnsError::network(server, e))?;
        handle
            .send(SerialMessage::new(request.to_vec(), addr))
            .map_err(|e| WinDnsError::network(server, e))?;

        while let Some(received) = stream.next().await {
            let (reply, src) = received
                .map_err(|e| WinDnsError::network(server, e))?
                .into_parts();
            // datagrams from other hosts or for other ids are stray replies
            if src == addr && reply.len() >= 2 && reply[..2] == request[..2] {
                return Ok(reply);
            }
            debug!(
                "Discarding {} byte datagram from {} for a foreign id",
                reply.len(),
                src
            );
        }
        Err(WinDnsError::network(server, "UDP stream closed"))
    }

    async fn send_tcp(&self, server: &str, addr: SocketAddr, request: &[u8]) -> Result<Vec<u8>> {
        if u16::try_from(request.len()).is_err() {
            return Err(WinDnsError::network(server, "request exceeds 65535 bytes"));
        }

        let (connect, mut handle) = TcpStream::<AsyncIoTokioAsStd<tokio::net::TcpStream>>::with_timeout(
            addr,
            Duration::from_secs(DEFAULT_EXCHANGE_TIMEOUT_SECS),
        );
        let mut stream = connect
            .await
            .map_err(|e| WinDnsError::network(server, e))?;
        handle
            .send(SerialMessage::new(request.to_vec(), addr))
            .map_err(|e| WinDnsError::network(server, e))?;

        match stream.next().await {
            Some(received) => Ok(received
                .map_err(|e| WinDnsError::network(server, e))?
                .into_parts()
                .0),
            None => Err(WinDnsError::network(server, "connection closed before reply")),
        }
    }
}

#[async_trait]
impl DnsTransport for NetTransport {
    async fn send(&self, server: &str, request: &[u8]) -> Result<Vec<u8>> {
        if request.len() < 2 {
            return Err(WinDnsError::network(server, "request shorter than header"));
        }
        let addr = self.resolve(server).await?;

        if request.len() > MAX_UDP_PAYLOAD_LEN {
            debug!(
                "Request of {} bytes exceeds UDP limit, using TCP to {}",
                request.len(),
                addr
            );
            return self.send_tcp(server, addr, request).await;
        }

        let reply = self.send_udp(server, addr, request).await?;
        if reply.len() > 2 && reply[2] & 0x02 != 0 {
            debug!("Truncated reply from {}, retrying over TCP", addr);
            return self.send_tcp(server, addr, request).await;
        }
        Ok(reply)
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod transport_tests;
