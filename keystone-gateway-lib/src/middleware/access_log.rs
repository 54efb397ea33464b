use std::net::IpAddr;
use std::time::Duration;

use http::{Method, StatusCode};
use tracing::info;

/// Structured access log line, emitted once per completed request
pub fn log_request(
    request_id: &str,
    method: &Method,
    path: &str,
    status: StatusCode,
    client_ip: IpAddr,
    elapsed: Duration,
) {
    info!(
        target: "access",
        %request_id,
        %method,
        %path,
        status = status.as_u16(),
        %client_ip,
        elapsed_ms = elapsed.as_millis() as u64,
        "request completed"
    );
}
