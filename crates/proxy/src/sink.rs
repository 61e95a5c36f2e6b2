//! Event sinks. The proxy core only knows the `EventSink` trait; the
//! JSON-lines sink is one rendering of the structured event stream, with
//! the opaque routing fields (`index`, `source`, `sourcetype`) merged
//! into every object for the downstream indexer.

use async_trait::async_trait;
use auditdns_domain::{ProxyError, ProxyEvent, SinkConfig};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write_event(&self, event: &ProxyEvent) -> Result<(), ProxyError>;
}

/// One JSON object per line, to a file or stdout.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
    routing: SinkConfig,
}

impl JsonLinesSink<tokio::fs::File> {
    pub async fn create(path: &str, routing: SinkConfig) -> Result<Self, ProxyError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| ProxyError::SinkError(format!("failed to open '{}': {}", path, e)))?;
        Ok(Self::new(file, routing))
    }
}

impl JsonLinesSink<tokio::io::Stdout> {
    pub fn stdout(routing: SinkConfig) -> Self {
        Self::new(tokio::io::stdout(), routing)
    }
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W, routing: SinkConfig) -> Self {
        Self {
            writer: Mutex::new(writer),
            routing,
        }
    }

    fn render(&self, event: &ProxyEvent) -> Result<Vec<u8>, ProxyError> {
        let mut value = serde_json::to_value(event)
            .map_err(|e| ProxyError::SinkError(format!("failed to serialize event: {}", e)))?;

        if let Value::Object(map) = &mut value {
            map.insert("index".to_string(), Value::from(self.routing.index.as_str()));
            map.insert(
                "source".to_string(),
                Value::from(self.routing.source.as_str()),
            );
            map.insert(
                "sourcetype".to_string(),
                Value::from(self.routing.sourcetype.as_str()),
            );
        }

        let mut line = serde_json::to_vec(&value)
            .map_err(|e| ProxyError::SinkError(format!("failed to serialize event: {}", e)))?;
        line.push(b'\n');
        Ok(line)
    }
}

#[async_trait]
impl<W> EventSink for JsonLinesSink<W>
where
    W: AsyncWrite + Send + Unpin,
{
    async fn write_event(&self, event: &ProxyEvent) -> Result<(), ProxyError> {
        let line = self.render(event)?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| ProxyError::SinkError(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| ProxyError::SinkError(e.to_string()))?;
        Ok(())
    }
}

/// In-memory capture, for tests and embedding.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<ProxyEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProxyEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn write_event(&self, event: &ProxyEvent) -> Result<(), ProxyError> {
        self.events
            .lock()
            .map_err(|_| ProxyError::SinkError("event buffer poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
