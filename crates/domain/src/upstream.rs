use crate::errors::ProxyError;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_DNS_PORT: u16 = 53;

/// The upstream resolver, parsed once at startup from a `host[:port]`
/// string. A hostname stays unresolved here; the orchestrator resolves it
/// to a socket address before the first query is forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamTarget {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl UpstreamTarget {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamTarget::Resolved(addr) => Some(*addr),
            UpstreamTarget::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            UpstreamTarget::Resolved(addr) => addr.port(),
            UpstreamTarget::Unresolved { port, .. } => *port,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UpstreamTarget::Unresolved { .. })
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamTarget::Resolved(addr) => write!(f, "{}", addr),
            UpstreamTarget::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

fn split_host_port(s: &str) -> Option<(&str, Option<&str>)> {
    if let Some(rest) = s.strip_prefix('[') {
        // Bracketed IPv6, with or without a port
        let end = rest.find(']')?;
        let host = &rest[..end];
        match &rest[end + 1..] {
            "" => Some((host, None)),
            tail => Some((host, Some(tail.strip_prefix(':')?))),
        }
    } else if let Some((host, port)) = s.rsplit_once(':') {
        // A second colon means an unbracketed IPv6 address, not a port
        if host.contains(':') {
            Some((s, None))
        } else {
            Some((host, Some(port)))
        }
    } else {
        Some((s, None))
    }
}

impl FromStr for UpstreamTarget {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ProxyError::InvalidUpstream(s.to_string()));
        }

        let (host, port) = split_host_port(s).ok_or_else(|| ProxyError::InvalidUpstream(s.to_string()))?;
        let port = match port {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ProxyError::InvalidUpstream(s.to_string()))?,
            None => DEFAULT_DNS_PORT,
        };
        if host.is_empty() {
            return Err(ProxyError::InvalidUpstream(s.to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(UpstreamTarget::Resolved(SocketAddr::new(ip, port)));
        }
        Ok(UpstreamTarget::Unresolved {
            hostname: host.into(),
            port,
        })
    }
}
