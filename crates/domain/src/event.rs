use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Transport a query arrived on (and is forwarded over).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Correlation metadata carried by every audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(rename = "client_address")]
    pub address: IpAddr,
    #[serde(rename = "client_port")]
    pub port: u16,
    pub protocol: Protocol,
}

impl ClientInfo {
    pub fn new(peer: SocketAddr, protocol: Protocol) -> Self {
        Self {
            address: peer.ip(),
            port: peer.port(),
            protocol,
        }
    }
}

/// Outcome section of a reply event: a NOERROR reply carries the
/// comma-joined list of answer record types, anything else carries the
/// textual response code. Checked at construction, not at the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyOutcome {
    Records { response_records: String },
    Code { response_code: String },
}

/// One audit event per lifecycle point of a proxied query.
///
/// Serialized with an internally tagged `type` field so the emitted JSON
/// matches the schema downstream consumers index on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyEvent {
    Received {
        #[serde(flatten)]
        client: ClientInfo,
        length: usize,
        data: String,
    },
    Sent {
        #[serde(flatten)]
        client: ClientInfo,
        length: usize,
        data: String,
    },
    Request {
        #[serde(flatten)]
        client: ClientInfo,
        query_name: String,
        // The wire schema names the decoded query type `response_type`
        // on request events too; downstream consumers index on it.
        #[serde(rename = "response_type")]
        query_type: String,
    },
    Reply {
        #[serde(flatten)]
        client: ClientInfo,
        query_name: String,
        #[serde(rename = "response_type")]
        query_type: String,
        #[serde(flatten)]
        outcome: ReplyOutcome,
    },
    TruncatedReply {
        #[serde(flatten)]
        client: ClientInfo,
        query_name: String,
        #[serde(rename = "response_type")]
        query_type: String,
        response_records: String,
    },
    InvalidRequest {
        #[serde(flatten)]
        client: ClientInfo,
        error: String,
    },
}

impl ProxyEvent {
    pub fn received(client: ClientInfo, payload: &[u8]) -> Self {
        ProxyEvent::Received {
            client,
            length: payload.len(),
            data: hex::encode(payload),
        }
    }

    pub fn sent(client: ClientInfo, payload: &[u8]) -> Self {
        ProxyEvent::Sent {
            client,
            length: payload.len(),
            data: hex::encode(payload),
        }
    }

    pub fn request(client: ClientInfo, query_name: String, query_type: String) -> Self {
        ProxyEvent::Request {
            client,
            query_name,
            query_type,
        }
    }

    pub fn reply_with_records(
        client: ClientInfo,
        query_name: String,
        query_type: String,
        response_records: String,
    ) -> Self {
        ProxyEvent::Reply {
            client,
            query_name,
            query_type,
            outcome: ReplyOutcome::Records { response_records },
        }
    }

    pub fn reply_with_code(
        client: ClientInfo,
        query_name: String,
        query_type: String,
        response_code: String,
    ) -> Self {
        ProxyEvent::Reply {
            client,
            query_name,
            query_type,
            outcome: ReplyOutcome::Code { response_code },
        }
    }

    pub fn truncated_reply(
        client: ClientInfo,
        query_name: String,
        query_type: String,
        response_records: String,
    ) -> Self {
        ProxyEvent::TruncatedReply {
            client,
            query_name,
            query_type,
            response_records,
        }
    }

    pub fn invalid_request(client: ClientInfo, error: impl fmt::Display) -> Self {
        ProxyEvent::InvalidRequest {
            client,
            error: error.to_string(),
        }
    }

    /// The wire-schema tag, as written into the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            ProxyEvent::Received { .. } => "received",
            ProxyEvent::Sent { .. } => "sent",
            ProxyEvent::Request { .. } => "request",
            ProxyEvent::Reply { .. } => "reply",
            ProxyEvent::TruncatedReply { .. } => "truncated_reply",
            ProxyEvent::InvalidRequest { .. } => "invalid_request",
        }
    }

    pub fn client(&self) -> &ClientInfo {
        match self {
            ProxyEvent::Received { client, .. }
            | ProxyEvent::Sent { client, .. }
            | ProxyEvent::Request { client, .. }
            | ProxyEvent::Reply { client, .. }
            | ProxyEvent::TruncatedReply { client, .. }
            | ProxyEvent::InvalidRequest { client, .. } => client,
        }
    }
}
