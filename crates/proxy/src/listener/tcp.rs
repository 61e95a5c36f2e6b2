//! TCP listener: one length-prefixed query per connection, the reply is
//! written back with its own prefix, then the connection is closed. A
//! bounded read timeout keeps a silent client from pinning a task forever.

use super::{process_query, ListenerContext};
use crate::framing;
use auditdns_domain::{ClientInfo, Protocol, ProxyError, ProxyEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{error, info, warn};

/// How long a client may take to deliver its complete framed query.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct TcpListener {
    listener: tokio::net::TcpListener,
    local_addr: SocketAddr,
}

impl TcpListener {
    /// Bind the listening socket. Failure here is fatal to startup.
    pub async fn bind(addr: &str) -> Result<Self, ProxyError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::BindFailed {
                protocol: Protocol::Tcp,
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ProxyError::BindFailed {
            protocol: Protocol::Tcp,
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept until the task is cancelled. Each connection is handled on
    /// its own task; the accept loop never waits on request handling.
    pub async fn serve(self, ctx: Arc<ListenerContext>) {
        info!(addr = %self.local_addr, "TCP listener serving");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "TCP accept error");
                    continue;
                }
            };

            let ctx = ctx.clone();
            tokio::spawn(async move {
                handle_connection(stream, peer, ctx).await;
            });
        }
    }
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, ctx: Arc<ListenerContext>) {
    let client = ClientInfo::new(peer, Protocol::Tcp);

    let query = match tokio::time::timeout(CLIENT_READ_TIMEOUT, framing::read_frame(&mut stream))
        .await
    {
        Ok(Ok(query)) => query,
        Ok(Err(e)) => {
            ctx.emitter.emit(ProxyEvent::invalid_request(client, &e));
            return;
        }
        Err(_) => {
            ctx.emitter
                .emit(ProxyEvent::invalid_request(client, ProxyError::ClientReadTimeout));
            return;
        }
    };

    if let Some(reply) = process_query(&ctx, client, &query).await {
        match framing::write_frame(&mut stream, &reply).await {
            Ok(()) => ctx.emitter.emit(ProxyEvent::sent(client, &reply)),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to send TCP reply"),
        }
    }
    // One request per connection; dropping the stream closes it.
}
