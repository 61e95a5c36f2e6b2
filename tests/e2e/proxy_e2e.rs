//! End-to-end tests: a full proxy instance against stub upstream
//! resolvers, checked through both the wire behavior seen by the client
//! and the audit event stream seen by the sink.

use auditdns_domain::{Config, Protocol, ProxyEvent};
use auditdns_proxy::{codec, framing, MemorySink, Proxy, ProxyHandle};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpStream, UdpSocket};

fn build_query(domain: &str) -> Vec<u8> {
    let mut query = Query::new();
    query.set_name(Name::from_str(domain).unwrap());
    query.set_query_type(RecordType::A);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(query_id(domain), MessageType::Query, OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);
    codec::encode(&message).unwrap()
}

// Deterministic per-domain id; real randomness is irrelevant here.
fn query_id(domain: &str) -> u16 {
    domain.bytes().fold(0x4d2u16, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u16))
}

fn answer_reply(query_bytes: &[u8], truncated: bool) -> Vec<u8> {
    let mut message = Message::from_vec(query_bytes).unwrap();
    let mut header = *message.header();
    header.set_message_type(MessageType::Response);
    message.set_header(header);
    message.set_recursion_available(true);
    message.set_truncated(truncated);
    let name = message.queries()[0].name().clone();
    message.add_answer(Record::from_rdata(
        name,
        60,
        RData::A(A("198.51.100.7".parse().unwrap())),
    ));
    codec::encode(&message).unwrap()
}

/// Stub UDP resolver that answers every query with one A record.
async fn spawn_udp_upstream(truncated: bool) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let reply = answer_reply(&buf[..len], truncated);
            let _ = socket.send_to(&reply, peer).await;
        }
    });
    addr
}

/// Stub TCP resolver: one framed query per connection, one framed reply.
async fn spawn_tcp_upstream() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                if let Ok(query) = framing::read_frame(&mut stream).await {
                    let reply = answer_reply(&query, false);
                    let _ = framing::write_frame(&mut stream, &reply).await;
                }
            });
        }
    });
    addr
}

async fn start_proxy(upstream: SocketAddr) -> (ProxyHandle, Arc<MemorySink>) {
    let mut config = Config::default();
    config.server.port = 0;
    config.server.address = "127.0.0.1".to_string();
    config.upstream.upstream_dns = upstream.to_string();
    config.upstream.query_timeout = 1;

    let sink = Arc::new(MemorySink::new());
    let proxy = Proxy::new(config, sink.clone());
    let handle = proxy.start().await.unwrap();
    (handle, sink)
}

async fn wait_for_events(sink: &MemorySink, expected: usize) -> Vec<ProxyEvent> {
    for _ in 0..400 {
        if sink.len() >= expected {
            return sink.events();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {} events, got {}: {:?}",
        expected,
        sink.len(),
        sink.events()
    );
}

#[tokio::test]
async fn udp_query_round_trip_with_full_event_sequence() {
    let upstream = spawn_udp_upstream(false).await;
    let (handle, sink) = start_proxy(upstream).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let query = build_query("example.com.");
    client.send_to(&query, handle.udp_addr()).await.unwrap();

    let mut buf = [0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("no reply from proxy")
        .unwrap();
    let reply = codec::decode(&buf[..len]).unwrap();
    assert_eq!(reply.query_name(), "example.com.");
    assert_eq!(reply.answer_types(), "A");

    let events = wait_for_events(&sink, 4).await;
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["received", "request", "reply", "sent"]);

    let client_port = client.local_addr().unwrap().port();
    for event in &events {
        assert_eq!(event.client().port, client_port);
        assert_eq!(event.client().protocol, Protocol::Udp);
    }
    match &events[1] {
        ProxyEvent::Request {
            query_name,
            query_type,
            ..
        } => {
            assert_eq!(query_name, "example.com.");
            assert_eq!(query_type, "A");
        }
        other => panic!("expected request event, got {:?}", other),
    }
    match &events[2] {
        ProxyEvent::Reply { outcome, .. } => {
            let json = serde_json::to_value(&events[2]).unwrap();
            assert_eq!(json["response_records"], "A");
            assert!(json.get("response_code").is_none(), "{:?}", outcome);
        }
        other => panic!("expected reply event, got {:?}", other),
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn malformed_udp_query_is_silently_dropped() {
    let upstream = spawn_udp_upstream(false).await;
    let (handle, sink) = start_proxy(upstream).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(b"definitely not dns", handle.udp_addr())
        .await
        .unwrap();

    let events = wait_for_events(&sink, 2).await;
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["received", "invalid_request"]);

    // Zero bytes go back to the client.
    let mut buf = [0u8; 64];
    let reply = tokio::time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
    assert!(reply.is_err(), "malformed query must not get a reply");

    handle.shutdown().await;
}

#[tokio::test]
async fn unreachable_upstream_yields_invalid_request_and_no_reply() {
    // A bound socket that never answers stands in for a dead resolver.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let (handle, sink) = start_proxy(silent.local_addr().unwrap()).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&build_query("gone.example.com."), handle.udp_addr())
        .await
        .unwrap();

    let events = wait_for_events(&sink, 3).await;
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["received", "request", "invalid_request"]);

    let mut buf = [0u8; 64];
    let reply = tokio::time::timeout(Duration::from_millis(300), client.recv_from(&mut buf)).await;
    assert!(reply.is_err(), "upstream failure must not produce a reply");

    handle.shutdown().await;
    drop(silent);
}

#[tokio::test]
async fn tcp_query_round_trips_with_correct_framing() {
    let upstream = spawn_tcp_upstream().await;
    let (handle, sink) = start_proxy(upstream).await;

    let mut stream = TcpStream::connect(handle.tcp_addr()).await.unwrap();
    let query = build_query("tcp.example.com.");
    framing::write_frame(&mut stream, &query).await.unwrap();

    // Read the raw prefix by hand: it must equal the payload length M,
    // followed by exactly M bytes.
    let mut prefix = [0u8; 2];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut prefix))
        .await
        .expect("no reply from proxy")
        .unwrap();
    let reply_len = u16::from_be_bytes(prefix) as usize;
    assert!(reply_len > 0);

    let mut payload = vec![0u8; reply_len];
    stream.read_exact(&mut payload).await.unwrap();
    let reply = codec::decode(&payload).unwrap();
    assert_eq!(reply.query_name(), "tcp.example.com.");

    // Connection closes after one request.
    let mut rest = [0u8; 1];
    let closed = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closed, 0);

    let events = wait_for_events(&sink, 4).await;
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["received", "request", "reply", "sent"]);
    assert!(events.iter().all(|e| e.client().protocol == Protocol::Tcp));

    handle.shutdown().await;
}

#[tokio::test]
async fn truncated_upstream_reply_is_flagged() {
    let upstream = spawn_udp_upstream(true).await;
    let (handle, sink) = start_proxy(upstream).await;

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(&build_query("big.example.com."), handle.udp_addr())
        .await
        .unwrap();

    let mut buf = [0u8; 4096];
    tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("truncated replies are still relayed")
        .unwrap();

    let events = wait_for_events(&sink, 4).await;
    let types: Vec<_> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types, vec!["received", "request", "truncated_reply", "sent"]);

    let json = serde_json::to_value(&events[2]).unwrap();
    assert_eq!(json["query_name"], "big.example.com.");
    assert_eq!(json["response_type"], "A");
    assert_eq!(json["response_records"], "A");

    handle.shutdown().await;
}

#[tokio::test]
async fn concurrent_udp_queries_keep_per_query_event_order() {
    const CLIENTS: usize = 50;

    let upstream = spawn_udp_upstream(false).await;
    let (handle, sink) = start_proxy(upstream).await;
    let proxy_addr = handle.udp_addr();

    let mut tasks = Vec::with_capacity(CLIENTS);
    for i in 0..CLIENTS {
        tasks.push(tokio::spawn(async move {
            let domain = format!("host{}.example.com.", i);
            let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let port = client.local_addr().unwrap().port();
            client
                .send_to(&build_query(&domain), proxy_addr)
                .await
                .unwrap();

            let mut buf = [0u8; 4096];
            tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
                .await
                .expect("no reply under concurrent load")
                .unwrap();
            (port, domain)
        }));
    }

    let mut by_port = std::collections::HashMap::new();
    for task in tasks {
        let (port, domain) = task.await.unwrap();
        by_port.insert(port, domain);
    }
    assert_eq!(by_port.len(), CLIENTS, "client source ports must be distinct");

    let events = wait_for_events(&sink, CLIENTS * 4).await;
    for (port, domain) in &by_port {
        let sequence: Vec<&ProxyEvent> = events
            .iter()
            .filter(|e| e.client().port == *port)
            .collect();
        let types: Vec<_> = sequence.iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec!["received", "request", "reply", "sent"],
            "bad sequence for {}",
            domain
        );

        // No cross-contamination: this port's request and reply must name
        // this client's domain.
        for event in &sequence {
            match event {
                ProxyEvent::Request { query_name, .. }
                | ProxyEvent::Reply { query_name, .. } => {
                    assert_eq!(query_name, domain);
                }
                _ => {}
            }
        }
    }

    handle.shutdown().await;
}
