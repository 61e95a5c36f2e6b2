//! Transport listeners. Each transport runs its own accept/serve loop and
//! hands every datagram or connection to its own task; the shared
//! per-request pipeline lives here.

pub mod tcp;
pub mod udp;

pub use tcp::TcpListener;
pub use udp::UdpListener;

use crate::codec;
use crate::emitter::EventEmitter;
use crate::forwarder::UpstreamForwarder;
use auditdns_domain::{ClientInfo, ProxyEvent};
use hickory_proto::op::ResponseCode;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared, read-only collaborators of every request handler.
pub struct ListenerContext {
    pub forwarder: Arc<UpstreamForwarder>,
    pub emitter: EventEmitter,
}

/// Run one query through the passthrough pipeline and return the raw
/// reply bytes to transmit, or `None` when the query is dropped.
///
/// Emits, in order: `received`, then either `invalid_request` (decode or
/// forward failure, silent drop per DNS convention) or `request` followed
/// by `reply`/`truncated_reply`. The caller transmits the reply and emits
/// `sent` afterwards, so the sent event never precedes the transmission.
pub(crate) async fn process_query(
    ctx: &ListenerContext,
    client: ClientInfo,
    query: &[u8],
) -> Option<Vec<u8>> {
    ctx.emitter.emit(ProxyEvent::received(client, query));

    let request = match codec::decode(query) {
        Ok(message) => message,
        Err(e) => {
            debug!(client = %client.address, error = %e, "Dropping undecodable query");
            ctx.emitter.emit(ProxyEvent::invalid_request(client, &e));
            return None;
        }
    };

    ctx.emitter.emit(ProxyEvent::request(
        client,
        request.query_name().to_string(),
        request.query_type().to_string(),
    ));

    let reply_bytes = match ctx.forwarder.forward(query, client.protocol).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(
                client = %client.address,
                query_name = request.query_name(),
                error = %e,
                "Upstream forward failed"
            );
            ctx.emitter.emit(ProxyEvent::invalid_request(client, &e));
            return None;
        }
    };

    let reply = match codec::decode(&reply_bytes) {
        Ok(message) => message,
        Err(e) => {
            warn!(client = %client.address, error = %e, "Dropping undecodable upstream reply");
            ctx.emitter.emit(ProxyEvent::invalid_request(client, &e));
            return None;
        }
    };

    let query_name = reply.query_name().to_string();
    let query_type = reply.query_type().to_string();

    if reply.is_truncated() {
        ctx.emitter.emit(ProxyEvent::truncated_reply(
            client,
            query_name,
            query_type,
            reply.answer_types(),
        ));
    } else if reply.response_code() == ResponseCode::NoError {
        ctx.emitter.emit(ProxyEvent::reply_with_records(
            client,
            query_name,
            query_type,
            reply.answer_types(),
        ));
    } else {
        ctx.emitter.emit(ProxyEvent::reply_with_code(
            client,
            query_name,
            query_type,
            reply.response_status().to_string(),
        ));
    }

    Some(reply_bytes)
}
