//! UDP listener: one datagram is one query, replies go back to the
//! datagram's return address with no framing.

use super::{process_query, ListenerContext};
use auditdns_domain::{ClientInfo, Protocol, ProxyError, ProxyEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};

/// Largest inbound datagram accepted, EDNS(0) included.
const MAX_UDP_QUERY_SIZE: usize = 4096;

#[derive(Debug)]
pub struct UdpListener {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpListener {
    /// Bind the serving socket. Failure here is fatal to startup.
    pub async fn bind(addr: &str) -> Result<Self, ProxyError> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| ProxyError::BindFailed {
            protocol: Protocol::Udp,
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let local_addr = socket.local_addr().map_err(|e| ProxyError::BindFailed {
            protocol: Protocol::Udp,
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the task is cancelled. Each datagram is handled on its
    /// own task; the receive loop never waits on a request in flight.
    pub async fn serve(self, ctx: Arc<ListenerContext>) {
        info!(addr = %self.local_addr, "UDP listener serving");
        let mut buf = [0u8; MAX_UDP_QUERY_SIZE];

        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "UDP recv error");
                    continue;
                }
            };

            let query = buf[..len].to_vec();
            let socket = self.socket.clone();
            let ctx = ctx.clone();

            tokio::spawn(async move {
                let client = ClientInfo::new(peer, Protocol::Udp);
                if let Some(reply) = process_query(&ctx, client, &query).await {
                    match socket.send_to(&reply, peer).await {
                        Ok(_) => ctx.emitter.emit(ProxyEvent::sent(client, &reply)),
                        Err(e) => warn!(peer = %peer, error = %e, "Failed to send UDP reply"),
                    }
                }
            });
        }
    }
}
