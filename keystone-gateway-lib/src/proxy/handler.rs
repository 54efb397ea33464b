use std::net::IpAddr;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use http::{Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper::Response;
use tracing::debug;

use crate::balancer::Backend;
use crate::proxy::http_result::{HttpError, HttpResult};
use crate::proxy::{RespBody, SharedClient};
use crate::routing::RouteMatch;

/// Headers that belong to one hop and must not be forwarded
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Forward one request to a live backend of the matched tenant
///
/// A pick failure is 503; an upstream failure is 502 and never flips
/// the backend's alive flag (liveness is owned by the probe loop).
pub(crate) async fn forward(
    route: &RouteMatch,
    parts: &http::request::Parts,
    path: &str,
    body: Bytes,
    client: &SharedClient,
    client_ip: IpAddr,
    proto: &'static str,
) -> HttpResult<Response<RespBody>> {
    let backend = route.tenant.pool.next().ok_or(HttpError::NoLiveBackends)?;
    // `path` is the cleaned path the routing table matched on.
    let uri = rewrite_uri(&backend, &route.prefix, path, parts.uri.query())?;

    debug!(
        tenant = %route.tenant.name,
        backend = backend.name(),
        %uri,
        "forwarding request"
    );

    let mut out_req = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .body(Full::new(body))
        .map_err(|e| HttpError::UpstreamRequest(e.to_string()))?;

    let headers = out_req.headers_mut();
    copy_end_to_end_headers(&parts.headers, headers);
    append_forwarded_for(headers, client_ip);
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(proto));

    let host_value = if route.tenant.preserve_host {
        parts.headers.get(HOST).cloned()
    } else {
        HeaderValue::from_str(backend.authority()).ok()
    };
    match host_value {
        Some(v) => {
            headers.insert(HOST, v);
        }
        None => {
            headers.remove(HOST);
        }
    }

    match client.request(out_req).await {
        Ok(resp) => {
            let mut resp = resp.map(BodyExt::boxed);
            strip_hop_by_hop(resp.headers_mut());
            Ok(resp)
        }
        Err(e) => Err(HttpError::Upstream(e.to_string())),
    }
}

/// Build the upstream URI: backend base, plus the request path with the
/// matched prefix stripped (path-mode) or unchanged (host-mode), plus
/// the original query string.
pub(crate) fn rewrite_uri(
    backend: &Backend,
    matched_prefix: &str,
    path: &str,
    query: Option<&str>,
) -> HttpResult<Uri> {
    let tail = if matched_prefix == "/" {
        path
    } else {
        // Prefixes are normalised to end in '/'; strip the slash-less form
        // so "/api/users" with prefix "/api/" leaves "/users".
        let trimmed = &matched_prefix[..matched_prefix.len() - 1];
        match path.strip_prefix(trimmed) {
            Some("") => "/",
            Some(rest) => rest,
            None => path,
        }
    };

    let mut path_and_query = format!("{}{}", backend.base_path(), tail);
    if path_and_query.is_empty() {
        path_and_query.push('/');
    }
    if let Some(q) = query {
        path_and_query.push('?');
        path_and_query.push_str(q);
    }

    Uri::builder()
        .scheme("http")
        .authority(backend.authority())
        .path_and_query(path_and_query.as_str())
        .build()
        .map_err(|e| HttpError::InvalidUri(e.to_string()))
}

fn copy_end_to_end_headers(src: &HeaderMap, dst: &mut HeaderMap) {
    // Connection may name additional per-hop headers.
    let connection_named: Vec<String> = src
        .get_all("connection")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .collect();

    for (name, value) in src {
        let lname = name.as_str();
        if HOP_BY_HOP.contains(&lname) || connection_named.iter().any(|c| c == lname) {
            continue;
        }
        dst.append(name.clone(), value.clone());
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let connection_named: Vec<String> = headers
        .get_all("connection")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|s| s.trim().to_ascii_lowercase())
        .collect();

    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    for name in connection_named {
        headers.remove(name.as_str());
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let appended = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {client_ip}"),
        _ => client_ip.to_string(),
    };
    if let Ok(v) = HeaderValue::from_str(&appended) {
        headers.insert(X_FORWARDED_FOR, v);
    }
}
