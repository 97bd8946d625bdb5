use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::config::{ServerConfig, MAX_PACKET_SIZE};
use crate::dns_cache::DNSCache;
use crate::error::DnsError;
use crate::resolver::{Resolver, Upstream};

/// Forwards queries over plain UDP, one throwaway socket per query.
pub struct UdpUpstream {
    addr: SocketAddr,
    timeout: Option<Duration>,
}

impl UdpUpstream {
    pub fn new(addr: SocketAddr, timeout: Option<Duration>) -> Self {
        UdpUpstream { addr, timeout }
    }

    fn round_trip(&self, query: &[u8]) -> std::io::Result<Bytes> {
        let local: SocketAddr = if self.addr.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)?;
        socket.set_read_timeout(self.timeout)?;
        socket.send_to(query, self.addr)?;

        let mut buf = [0; MAX_PACKET_SIZE];
        let (size, source) = socket.recv_from(&mut buf)?;
        if source != self.addr {
            warn!(upstream = %self.addr, from = %source, "reply from unexpected address");
        }
        debug!(upstream = %source, size, "received upstream reply");

        Ok(Bytes::copy_from_slice(&buf[..size]))
    }
}

impl Upstream for UdpUpstream {
    fn forward(&self, query: &[u8]) -> Result<Bytes, DnsError> {
        self.round_trip(query).map_err(|source| DnsError::Upstream {
            addr: self.addr,
            source,
        })
    }
}

/// Stops a running [`DNSServer`] loop before its next receive.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct DNSServer {
    socket: UdpSocket,
    resolver: Resolver<UdpUpstream>,
    running: Arc<AtomicBool>,
}

impl DNSServer {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let socket = UdpSocket::bind(config.listen)
            .with_context(|| format!("Failed to bind to address {}", config.listen))?;

        let cache = Arc::new(DNSCache::new());
        let upstream = UdpUpstream::new(config.upstream, config.upstream_timeout);

        Ok(Self {
            socket,
            resolver: Resolver::new(cache, upstream),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to read listening address")
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
        }
    }

    /// Serves queries one at a time until stopped. Failed exchanges are
    /// logged and dropped without a reply.
    pub fn start(&self) {
        let mut buf = [0; MAX_PACKET_SIZE];

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.serve_one(&mut buf) {
                warn!("Dropping request: {:#}", e);
            }
        }

        info!("DNS server stopped");
    }

    /// Receives one query, resolves it and sends the reply back.
    pub fn serve_one(&self, buf: &mut [u8; MAX_PACKET_SIZE]) -> Result<()> {
        let (size, source) = self
            .socket
            .recv_from(buf)
            .context("Error receiving data")?;
        info!(peer = %source, size, "received DNS query");

        let response = self.resolver.resolve(&buf[..size]).map_err(|e| {
            if e.is_malformed() {
                debug!(peer = %source, "malformed packet {:?}", &buf[..size]);
            }
            anyhow::Error::new(e)
                .context(format!("Failed to resolve query from {}", source))
        })?;

        self.socket
            .send_to(&response, source)
            .with_context(|| format!("Failed to send response to {}", source))?;
        debug!(
            peer = %source,
            size = response.len(),
            cached = self.resolver.cache().len(),
            "sent response"
        );

        Ok(())
    }
}
