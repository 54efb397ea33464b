use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use hyper::body::Bytes;
use serde_json::json;

use crate::proxy::{full_body, RespBody};
use crate::routing::RoutingTable;

/// Reserved endpoints under the configured admin base path
pub enum AdminEndpoint {
    Health,
    Tenants,
}

pub fn match_endpoint(admin_base_path: &str, path: &str) -> Option<AdminEndpoint> {
    let base = admin_base_path.trim_end_matches('/');
    match path.strip_prefix(base)? {
        "/health" => Some(AdminEndpoint::Health),
        "/tenants" => Some(AdminEndpoint::Tenants),
        _ => None,
    }
}

pub fn respond(endpoint: AdminEndpoint, table: &RoutingTable) -> Response<RespBody> {
    match endpoint {
        AdminEndpoint::Health => health_response(),
        AdminEndpoint::Tenants => tenants_response(table),
    }
}

/// Liveness: 200 OK whenever the process can serve
fn health_response() -> Response<RespBody> {
    let mut resp = Response::new(full_body("OK"));
    *resp.status_mut() = StatusCode::OK;
    resp
}

/// Read-only listing of tenants, their rules, and backend liveness
fn tenants_response(table: &RoutingTable) -> Response<RespBody> {
    let tenants: Vec<_> = table
        .tenants()
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "domains": t.domains,
                "path_prefix": t.path_prefix,
                "alive_backends": t.pool.alive_count(),
                "services": t.pool.backends().iter().map(|b| {
                    json!({
                        "name": b.name(),
                        "url": b.url(),
                        "alive": b.is_alive(),
                    })
                }).collect::<Vec<_>>(),
            })
        })
        .collect();

    let body = serde_json::to_vec(&tenants).unwrap_or_else(|_| b"[]".to_vec());
    let mut resp = Response::new(full_body(Bytes::from(body)));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}
