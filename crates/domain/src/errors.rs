use crate::event::Protocol;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    #[error("Invalid upstream target '{0}': expected 'host' or 'host:port'")]
    InvalidUpstream(String),

    #[error("Failed to resolve upstream target '{0}'")]
    UnresolvableUpstream(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to bind {protocol} listener on {addr}: {reason}")]
    BindFailed {
        protocol: Protocol,
        addr: String,
        reason: String,
    },

    #[error("Malformed DNS message: {0}")]
    MalformedMessage(String),

    #[error("Upstream {server} did not reply within the timeout")]
    UpstreamTimeout { server: String },

    #[error("Upstream {server} refused the connection: {reason}")]
    UpstreamConnectionRefused { server: String, reason: String },

    #[error("I/O error talking to upstream {server}: {reason}")]
    UpstreamIo { server: String, reason: String },

    #[error("Message of {0} bytes exceeds the 65535-byte TCP frame limit")]
    OversizedFrame(usize),

    #[error("Truncated TCP frame: {0}")]
    TruncatedFrame(String),

    #[error("TCP stream error: {0}")]
    StreamIo(String),

    #[error("Client did not complete its request within the read timeout")]
    ClientReadTimeout,

    #[error("Event sink error: {0}")]
    SinkError(String),
}
