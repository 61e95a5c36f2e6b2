//! Audit event pipeline. Request handlers emit into an unbounded channel
//! and never block on the sink; a consumer task drains the channel into
//! the configured `EventSink`. Per-query ordering holds because each
//! handler emits its events sequentially and the channel preserves
//! per-sender order.

use crate::sink::EventSink;
use auditdns_domain::ProxyEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct EventEmitter {
    sender: mpsc::UnboundedSender<ProxyEvent>,
}

impl EventEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProxyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: tx }, rx)
    }

    /// Record one lifecycle event. Losing an audit event must never drop
    /// a DNS reply, so a closed channel is a warning, not an error.
    pub fn emit(&self, event: ProxyEvent) {
        if self.sender.send(event).is_err() {
            warn!("audit event dropped: sink consumer is gone");
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").finish()
    }
}

/// Drains the event channel into a sink. Sink failures are logged and
/// skipped; they never stall the proxy.
pub struct SinkConsumer {
    sink: Arc<dyn EventSink>,
}

impl SinkConsumer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn start(self, mut rx: mpsc::UnboundedReceiver<ProxyEvent>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut written = 0u64;
            let mut failed = 0u64;

            while let Some(event) = rx.recv().await {
                match self.sink.write_event(&event).await {
                    Ok(()) => written += 1,
                    Err(e) => {
                        failed += 1;
                        warn!(
                            error = %e,
                            event_type = event.event_type(),
                            "Failed to record audit event (non-critical)"
                        );
                    }
                }
            }

            debug!(written, failed, "Event sink consumer shutting down");
        })
    }
}
