use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::OnceLock;

use http::header::HeaderMap;
use ipnet::IpNet;

/// Derive the real client IP for one request
///
/// X-Forwarded-For / X-Real-IP are honoured only when the immediate
/// peer is a trusted proxy (loopback or private-range address);
/// otherwise the peer address wins.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    if is_trusted_peer(peer.ip()) {
        if let Some(ip) = forwarded_for(headers) {
            return ip;
        }
        if let Some(ip) = real_ip_header(headers) {
            return ip;
        }
    }
    peer.ip()
}

fn trusted_networks() -> &'static [IpNet] {
    static NETWORKS: OnceLock<Vec<IpNet>> = OnceLock::new();
    NETWORKS.get_or_init(|| {
        [
            "127.0.0.0/8",
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "::1/128",
            "fc00::/7",
            "fe80::/10",
        ]
        .iter()
        .filter_map(|net| IpNet::from_str(net).ok())
        .collect()
    })
}

fn is_trusted_peer(ip: IpAddr) -> bool {
    trusted_networks().iter().any(|net| net.contains(&ip))
}

/// Left-most X-Forwarded-For entry that parses as an address
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|s| s.trim().parse().ok())
}

fn real_ip_header(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
