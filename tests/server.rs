//! HTTP API over a real socket.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use arec::server::{RecommendResponse, Server};
use arec::test_utils::fixtures::heuristic_recommender;

fn start() -> SocketAddr {
    start_with_timeout(Duration::from_secs(30))
}

fn start_with_timeout(io_timeout: Duration) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0", Arc::new(heuristic_recommender()))
        .unwrap()
        .with_io_timeout(io_timeout);
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.serve());
    addr
}

/// Connect, send `bytes`, then wait (bounded) for the server to answer and
/// close.
fn exchange(addr: SocketAddr, bytes: &[u8]) -> (String, Duration) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    stream.write_all(bytes).unwrap();
    let started = Instant::now();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).unwrap();
    (String::from_utf8_lossy(&reply).into_owned(), started.elapsed())
}

fn client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::new()
}

#[test]
fn health_is_ready() {
    let addr = start();
    let response = client().get(format!("http://{addr}/health")).send().unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"].to_str().unwrap(),
        "*"
    );
    let body: Value = response.json().unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["records"], 13);
}

#[test]
fn recommend_round_trip() {
    let addr = start();
    let response = client()
        .post(format!("http://{addr}/recommend"))
        .json(&json!({"query": "Java developer who can collaborate effectively, 40 minutes"}))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: RecommendResponse = response.json().unwrap();
    assert!((5..=10).contains(&body.recommendations.len()));
    assert!(body
        .recommendations
        .iter()
        .any(|r| r.name == "Core Java Coding Test" && r.duration.as_deref() == Some("40 minutes")));
    assert!(body
        .recommendations
        .iter()
        .any(|r| r.category == "Personality & Behavior"));
}

#[test]
fn concurrent_requests_are_served() {
    let addr = start();
    let handles: Vec<_> = ["Java developer", "SQL analyst", "team leadership", "Python coding"]
        .into_iter()
        .map(|query| {
            thread::spawn(move || {
                client()
                    .post(format!("http://{addr}/recommend"))
                    .json(&json!({ "query": query }))
                    .send()
                    .unwrap()
                    .status()
                    .as_u16()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 200);
    }
}

#[test]
fn bad_requests_get_structured_errors() {
    let addr = start();

    let empty = client()
        .post(format!("http://{addr}/recommend"))
        .json(&json!({"query": ""}))
        .send()
        .unwrap();
    assert_eq!(empty.status().as_u16(), 400);
    let body: Value = empty.json().unwrap();
    assert_eq!(body["error"]["code"], "QUERY_INVALID");
    assert!(!body["error"]["suggestion"].as_str().unwrap().is_empty());

    let missing = client().get(format!("http://{addr}/nope")).send().unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[test]
fn chunked_body_is_rejected_with_400() {
    let addr = start();
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .write_all(b"POST /recommend HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n")
        .unwrap();
    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{reply}");
    assert!(reply.contains("HTTP_PROTOCOL"));
}

#[test]
fn idle_client_is_dropped_after_io_timeout() {
    let addr = start_with_timeout(Duration::from_millis(300));
    let (reply, waited) = exchange(addr, b"");
    assert!(reply.is_empty(), "{reply}");
    assert!(waited < Duration::from_secs(5), "held for {waited:?}");

    // The server still answers afterwards.
    let (reply, _) = exchange(addr, b"GET /health HTTP/1.1\r\nHost: x\r\n\r\n");
    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
}

#[test]
fn stalled_partial_request_gets_400_after_io_timeout() {
    let addr = start_with_timeout(Duration::from_millis(300));
    let (reply, waited) = exchange(addr, b"GET /health HTTP/1.1\r\nHost: x\r\n");
    assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{reply}");
    assert!(reply.contains("timed out"));
    assert!(waited < Duration::from_secs(5), "held for {waited:?}");
}

#[test]
fn oversized_body_gets_413() {
    let addr = start();
    let (reply, _) = exchange(
        addr,
        b"POST /recommend HTTP/1.1\r\nHost: x\r\nContent-Length: 5000000\r\n\r\n",
    );
    assert!(reply.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{reply}");
    assert!(reply.contains("HTTP_PAYLOAD_TOO_LARGE"));
}
