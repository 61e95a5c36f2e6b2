//! Upstream forwarder: relays a raw query to the configured resolver and
//! returns the raw reply bytes. One fresh connection per request; the
//! proxy is a stateless passthrough and keeps no connection state between
//! calls.

use crate::framing;
use auditdns_domain::{Protocol, ProxyError};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tracing::{debug, warn};

/// Maximum UDP DNS reply size accepted from upstream, EDNS(0) included.
const MAX_UDP_REPLY_SIZE: usize = 4096;

pub struct UpstreamForwarder {
    server: SocketAddr,
    timeout: Duration,
}

impl UpstreamForwarder {
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Forward `query` over the given transport and return the raw reply.
    ///
    /// The transport toward upstream mirrors the transport the client used;
    /// it is independent of whatever else the proxy is serving.
    pub async fn forward(&self, query: &[u8], protocol: Protocol) -> Result<Vec<u8>, ProxyError> {
        match protocol {
            Protocol::Udp => self.forward_udp(query).await,
            Protocol::Tcp => self.forward_tcp(query).await,
        }
    }

    async fn forward_udp(&self, query: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let bind_addr: SocketAddr = if self.server.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| self.io_error("failed to bind query socket", e))?;

        tokio::time::timeout(self.timeout, socket.send_to(query, self.server))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.io_error("failed to send query", e))?;

        let mut reply = vec![0u8; MAX_UDP_REPLY_SIZE];
        let (len, from) = tokio::time::timeout(self.timeout, socket.recv_from(&mut reply))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.io_error("failed to receive reply", e))?;

        if from.ip() != self.server.ip() {
            warn!(
                expected = %self.server,
                received_from = %from,
                "UDP reply from unexpected source"
            );
        }

        reply.truncate(len);
        debug!(server = %self.server, reply_len = len, "UDP reply received");
        Ok(reply)
    }

    async fn forward_tcp(&self, query: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.server))
            .await
            .map_err(|_| self.timeout_error())?
            .map_err(|e| self.connect_error(e))?;

        stream
            .set_nodelay(true)
            .map_err(|e| self.io_error("failed to set TCP_NODELAY", e))?;

        tokio::time::timeout(self.timeout, framing::write_frame(&mut stream, query))
            .await
            .map_err(|_| self.timeout_error())??;

        let reply = tokio::time::timeout(self.timeout, framing::read_frame(&mut stream))
            .await
            .map_err(|_| self.timeout_error())??;

        debug!(server = %self.server, reply_len = reply.len(), "TCP reply received");
        Ok(reply)
    }

    fn timeout_error(&self) -> ProxyError {
        ProxyError::UpstreamTimeout {
            server: self.server.to_string(),
        }
    }

    fn connect_error(&self, e: io::Error) -> ProxyError {
        if e.kind() == io::ErrorKind::ConnectionRefused {
            ProxyError::UpstreamConnectionRefused {
                server: self.server.to_string(),
                reason: e.to_string(),
            }
        } else {
            self.io_error("failed to connect", e)
        }
    }

    fn io_error(&self, what: &str, e: io::Error) -> ProxyError {
        ProxyError::UpstreamIo {
            server: self.server.to_string(),
            reason: format!("{}: {}", what, e),
        }
    }
}
