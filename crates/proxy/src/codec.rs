//! Thin adapter over `hickory-proto`, exposing only the parsed view the
//! audit event model needs: question name and type, answer record types,
//! response code, and the truncation bit.

use auditdns_domain::ProxyError;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

/// Read-only parsed view of a query or reply.
///
/// A message without a question section is treated as malformed: every
/// audit event derived from a decoded message carries the query name.
#[derive(Debug)]
pub struct DecodedMessage {
    query_name: String,
    query_type: String,
    message: Message,
}

pub fn decode(bytes: &[u8]) -> Result<DecodedMessage, ProxyError> {
    let message =
        Message::from_vec(bytes).map_err(|e| ProxyError::MalformedMessage(e.to_string()))?;

    let query = message
        .queries()
        .first()
        .ok_or_else(|| ProxyError::MalformedMessage("no question section".to_string()))?;

    let query_name = query.name().to_utf8();
    let query_type = query.query_type().to_string();

    Ok(DecodedMessage {
        query_name,
        query_type,
        message,
    })
}

/// Serialize a message to wire format. Used by the test stubs; the proxy
/// itself relays raw bytes untouched.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProxyError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message
        .emit(&mut encoder)
        .map_err(|e| ProxyError::MalformedMessage(e.to_string()))?;
    Ok(buf)
}

impl DecodedMessage {
    /// FQDN of the first question, with trailing dot.
    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn query_type(&self) -> &str {
        &self.query_type
    }

    pub fn is_truncated(&self) -> bool {
        self.message.truncated()
    }

    pub fn response_code(&self) -> ResponseCode {
        self.message.response_code()
    }

    pub fn response_status(&self) -> &'static str {
        rcode_to_status(self.message.response_code())
    }

    /// Comma-joined record types of the answer section, e.g. `"CNAME,A,A"`.
    pub fn answer_types(&self) -> String {
        self.message
            .answers()
            .iter()
            .map(|record| record.record_type().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn rcode_to_status(rcode: ResponseCode) -> &'static str {
    match rcode {
        ResponseCode::NoError => "NOERROR",
        ResponseCode::NXDomain => "NXDOMAIN",
        ResponseCode::ServFail => "SERVFAIL",
        ResponseCode::Refused => "REFUSED",
        ResponseCode::NotImp => "NOTIMP",
        ResponseCode::FormErr => "FORMERR",
        _ => "UNKNOWN",
    }
}
