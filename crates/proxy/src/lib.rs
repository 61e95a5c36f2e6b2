//! The proxy engine: wire-codec adapter, upstream forwarder, UDP/TCP
//! listeners, the audit event pipeline, and the orchestrator that ties
//! them together.
pub mod codec;
pub mod emitter;
pub mod forwarder;
pub mod framing;
pub mod listener;
pub mod orchestrator;
pub mod sink;

pub use emitter::{EventEmitter, SinkConsumer};
pub use forwarder::UpstreamForwarder;
pub use orchestrator::{Proxy, ProxyHandle};
pub use sink::{EventSink, JsonLinesSink, MemorySink};
