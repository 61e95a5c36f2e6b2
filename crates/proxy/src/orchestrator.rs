//! Proxy orchestrator: resolves the upstream target once, builds one
//! forwarder and one event pipeline, and runs the UDP and TCP listeners
//! as a unit on the same address and port.

use crate::emitter::{EventEmitter, SinkConsumer};
use crate::forwarder::UpstreamForwarder;
use crate::listener::{ListenerContext, TcpListener, UdpListener};
use crate::sink::EventSink;
use auditdns_domain::{Config, ProxyError, UpstreamTarget};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Proxy {
    config: Config,
    sink: Arc<dyn EventSink>,
    // Create-once: `Some` means the listeners are live for the rest of
    // the process, and further starts return this handle.
    handle: tokio::sync::Mutex<Option<ProxyHandle>>,
}

impl Proxy {
    pub fn new(config: Config, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            sink,
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Start serving on both transports. Idempotent: a second call does
    /// not rebind and returns a handle to the running instance.
    pub async fn start(&self) -> Result<ProxyHandle, ProxyError> {
        let mut slot = self.handle.lock().await;
        if let Some(handle) = slot.as_ref() {
            debug!("proxy already started, returning existing handle");
            return Ok(handle.clone());
        }

        self.config.validate()?;
        let target: UpstreamTarget = self.config.upstream.upstream_dns.parse()?;
        let upstream = resolve_target(&target).await?;
        let timeout = Duration::from_secs(self.config.upstream.query_timeout);

        let listen_addr = self.config.server.listen_addr();
        let udp = UdpListener::bind(&listen_addr).await?;
        let tcp = TcpListener::bind(&listen_addr).await?;
        let udp_addr = udp.local_addr();
        let tcp_addr = tcp.local_addr();

        let (emitter, rx) = EventEmitter::channel();
        let writer_task = SinkConsumer::new(self.sink.clone()).start(rx);

        let ctx = Arc::new(ListenerContext {
            forwarder: Arc::new(UpstreamForwarder::new(upstream, timeout)),
            emitter: emitter.clone(),
        });

        let udp_task = tokio::spawn(udp.serve(ctx.clone()));
        let tcp_task = tokio::spawn(tcp.serve(ctx));

        info!(
            udp = %udp_addr,
            tcp = %tcp_addr,
            upstream = %upstream,
            timeout_secs = timeout.as_secs(),
            "DNS proxy started"
        );

        let handle = ProxyHandle {
            inner: Arc::new(HandleInner {
                udp_addr,
                tcp_addr,
                listener_tasks: vec![udp_task, tcp_task],
                writer_task: std::sync::Mutex::new(Some(writer_task)),
                emitter: std::sync::Mutex::new(Some(emitter)),
            }),
        };
        *slot = Some(handle.clone());
        Ok(handle)
    }
}

async fn resolve_target(target: &UpstreamTarget) -> Result<SocketAddr, ProxyError> {
    if let Some(addr) = target.socket_addr() {
        return Ok(addr);
    }
    tokio::net::lookup_host(target.to_string())
        .await
        .map_err(|_| ProxyError::UnresolvableUpstream(target.to_string()))?
        .next()
        .ok_or_else(|| ProxyError::UnresolvableUpstream(target.to_string()))
}

/// Live serving sockets plus the event pipeline behind them.
#[derive(Clone, Debug)]
pub struct ProxyHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    udp_addr: SocketAddr,
    tcp_addr: SocketAddr,
    listener_tasks: Vec<JoinHandle<()>>,
    writer_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    emitter: std::sync::Mutex<Option<EventEmitter>>,
}

impl ProxyHandle {
    pub fn udp_addr(&self) -> SocketAddr {
        self.inner.udp_addr
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.inner.tcp_addr
    }

    /// Stop accepting new queries, let requests already in flight finish,
    /// and drain the event channel into the sink before returning.
    pub async fn shutdown(&self) {
        for task in &self.inner.listener_tasks {
            task.abort();
        }

        // Dropping the handle's emitter closes the channel once in-flight
        // request tasks release their clones; the writer then drains and
        // exits.
        if let Ok(mut emitter) = self.inner.emitter.lock() {
            emitter.take();
        }
        let writer = self
            .inner
            .writer_task
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        info!("DNS proxy stopped");
    }
}
