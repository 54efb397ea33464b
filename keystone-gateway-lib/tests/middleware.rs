use std::net::SocketAddr;

use http::header::{HeaderMap, HeaderValue};
use keystone_gateway_lib::config::CompressionConfig;
use keystone_gateway_lib::middleware::{clean, client_ip, request_id};

fn peer(addr: &str) -> SocketAddr {
    addr.parse().expect("peer address")
}

#[test]
fn cleans_dot_segments() {
    assert_eq!(clean("/"), "/");
    assert_eq!(clean(""), "/");
    assert_eq!(clean("/a/b/c"), "/a/b/c");
    assert_eq!(clean("/a//b"), "/a/b");
    assert_eq!(clean("/a/./b"), "/a/b");
    assert_eq!(clean("/a/../b"), "/b");
    assert_eq!(clean("/../../a"), "/a");
    assert_eq!(clean("/a/b/../.."), "/");
    assert_eq!(clean("/a/b/"), "/a/b");
}

#[test]
fn propagates_existing_request_id() {
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_static("abc-123"));
    assert_eq!(request_id(&headers), "abc-123");
}

#[test]
fn generates_request_id_when_absent() {
    let headers = HeaderMap::new();
    let id = request_id(&headers);
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

    // Two generated IDs should differ.
    assert_ne!(id, request_id(&headers));
}

#[test]
fn trusts_forwarded_for_from_private_peer() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));

    let ip = client_ip(&headers, peer("10.0.0.2:4000"));
    assert_eq!(ip.to_string(), "203.0.113.7");
}

#[test]
fn ignores_forwarded_for_from_public_peer() {
    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));

    let ip = client_ip(&headers, peer("198.51.100.9:4000"));
    assert_eq!(ip.to_string(), "198.51.100.9");
}

#[test]
fn falls_back_to_real_ip_header() {
    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.9"));

    let ip = client_ip(&headers, peer("127.0.0.1:4000"));
    assert_eq!(ip.to_string(), "203.0.113.9");
}

#[test]
fn uses_peer_when_no_headers() {
    let headers = HeaderMap::new();
    let ip = client_ip(&headers, peer("127.0.0.1:4000"));
    assert_eq!(ip.to_string(), "127.0.0.1");
}

#[test]
fn compression_config_matches_media_type() {
    let cfg = CompressionConfig::default();
    assert!(cfg.should_compress("application/json"));
    assert!(cfg.should_compress("text/html; charset=utf-8"));
    assert!(cfg.should_compress("TEXT/PLAIN"));
    assert!(!cfg.should_compress("image/png"));
    assert!(!cfg.should_compress("application/octet-stream"));
}
