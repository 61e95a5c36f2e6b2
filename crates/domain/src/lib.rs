//! Auditdns domain layer: configuration, the audit event model, upstream
//! target addressing, and the error taxonomy shared by the proxy engine.
pub mod config;
pub mod errors;
pub mod event;
pub mod upstream;

pub use config::{Config, LoggingConfig, ServerConfig, SinkConfig, UpstreamConfig};
pub use errors::ProxyError;
pub use event::{ClientInfo, Protocol, ProxyEvent, ReplyOutcome};
pub use upstream::UpstreamTarget;
