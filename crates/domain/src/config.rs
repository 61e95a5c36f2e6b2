use crate::errors::ProxyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address to serve on; empty binds all interfaces.
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstream resolver as `host` or `host:port` (port defaults to 53).
    #[serde(default)]
    pub upstream_dns: String,
    /// Seconds to wait for an upstream reply.
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Event sink settings. The routing fields are not interpreted by the
/// proxy; they are merged verbatim into every emitted event for the
/// downstream indexer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Output file for audit events; stdout when absent.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_source")]
    pub sourcetype: String,
}

impl Config {
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.upstream.upstream_dns.trim().is_empty() {
            return Err(ProxyError::ConfigError(
                "upstream_dns is required".to_string(),
            ));
        }
        if self.upstream.query_timeout == 0 {
            return Err(ProxyError::ConfigError(
                "query_timeout must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

impl ServerConfig {
    /// The `host:port` string listeners bind to. An empty address means
    /// all interfaces.
    pub fn listen_addr(&self) -> String {
        let address = if self.address.is_empty() {
            "0.0.0.0"
        } else {
            self.address.as_str()
        };
        format!("{}:{}", address, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: String::new(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            upstream_dns: String::new(),
            query_timeout: default_query_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: None,
            index: default_index(),
            source: default_source(),
            sourcetype: default_source(),
        }
    }
}

fn default_port() -> u16 {
    53
}
fn default_query_timeout() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_index() -> String {
    "default".to_string()
}
fn default_source() -> String {
    "dns_proxy".to_string()
}
