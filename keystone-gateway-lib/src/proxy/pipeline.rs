use std::net::{IpAddr, SocketAddr};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use http::header::{ACCEPT_ENCODING, HOST};
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use hyper::body::Incoming;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, warn};

use crate::admin;
use crate::gateway::Gateway;
use crate::middleware::{
    clean, client_ip, log_request, maybe_compress, read_body_capped, request_id,
    REQUEST_ID_HEADER, REQUEST_TIMEOUT,
};
use crate::scripting::{GlobalOutcome, ScriptRequest};

use super::handler::forward;
use super::http_result::{HttpError, HttpResult};
use super::response::{synthetic_error_response, RespBody};

/// Serve one request through the full middleware pipeline
///
/// Request ID and client IP are derived first so the access log always
/// carries them; panic recovery and the wall-clock deadline wrap
/// everything downstream; compression and the access log run last.
pub async fn handle(
    gw: Arc<Gateway>,
    req: Request<Incoming>,
    peer: SocketAddr,
    proto: &'static str,
) -> Response<RespBody> {
    let started = Instant::now();
    let method = req.method().clone();
    let raw_path = req.uri().path().to_string();
    let rid = request_id(req.headers());
    let ip = client_ip(req.headers(), peer);
    let accept_encoding = req
        .headers()
        .get(ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let work = AssertUnwindSafe(process(Arc::clone(&gw), req, ip, proto)).catch_unwind();
    let outcome = timeout(REQUEST_TIMEOUT, work).await;

    let mut response = match outcome {
        Err(_) => synthetic_error_response(StatusCode::REQUEST_TIMEOUT, "request deadline exceeded"),
        Ok(Err(_)) => {
            error!(request_id = %rid, "handler panicked");
            synthetic_error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
        Ok(Ok(Ok(resp))) => resp,
        Ok(Ok(Err(err))) => {
            let status = StatusCode::from(err.clone());
            if status.is_server_error() {
                warn!(request_id = %rid, error = %err, status = status.as_u16(), "request failed");
            } else {
                debug!(request_id = %rid, error = %err, status = status.as_u16(), "request rejected");
            }
            synthetic_error_response(status, &err.to_string())
        }
    };

    if let Ok(v) = HeaderValue::from_str(&rid) {
        response.headers_mut().insert(REQUEST_ID_HEADER, v);
    }
    let response = maybe_compress(response, accept_encoding.as_deref(), &gw.config.compression);
    log_request(&rid, &method, &raw_path, response.status(), ip, started.elapsed());
    response
}

async fn process(
    gw: Arc<Gateway>,
    req: Request<Incoming>,
    ip: IpAddr,
    proto: &'static str,
) -> HttpResult<Response<RespBody>> {
    let _permit = gw.limiter.try_acquire().ok_or(HttpError::Overloaded)?;

    let host = request_host(&req);
    let path = clean(req.uri().path());

    if let Some(endpoint) = admin::match_endpoint(&gw.config.admin_base_path, &path) {
        return Ok(admin::respond(endpoint, &gw.table));
    }

    let (parts, body) = req.into_parts();
    let body = read_body_capped(body, gw.config.request_limits.max_body_size).await?;

    // Root-scoped middleware from global scripts runs before routing.
    let mut chain_headers: Vec<(String, String)> = Vec::new();
    if let Some(engine) = gw.engine.as_ref().filter(|e| e.has_global_middlewares()) {
        let sreq = script_request(&parts, &host, &path, Vec::new(), &body);
        match engine.run_global_chain(sreq).await? {
            GlobalOutcome::Halt(resp) => return Ok(resp),
            GlobalOutcome::Continue(headers) => chain_headers = headers,
        }
    }

    let Some(route) = gw.table.match_route(&host, &path) else {
        return Err(HttpError::NoTenantMatched);
    };

    let local_path = tenant_local_path(&route.prefix, &path);

    if let Some(engine) = &gw.engine {
        if let Some((script_route, params)) =
            engine.find_route(&route.tenant.name, &parts.method, &local_path)
        {
            let sreq = script_request(&parts, &host, &path, params, &body);
            let mut resp = engine.dispatch(&script_route, sreq, &local_path).await?;
            apply_headers(&mut resp, &chain_headers);
            return Ok(resp);
        }
    }

    let mut resp = forward(&route, &parts, &path, body, &gw.client, ip, proto).await?;
    apply_headers(&mut resp, &chain_headers);
    Ok(resp)
}

/// Host from the URI authority (HTTP/2) or the Host header (HTTP/1.1)
fn request_host(req: &Request<Incoming>) -> String {
    req.uri()
        .host()
        .map(str::to_string)
        .or_else(|| {
            req.headers()
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default()
}

/// The path a tenant's scripts see: matched prefix stripped for
/// path-mode tenants, unchanged for host-mode
fn tenant_local_path(prefix: &str, path: &str) -> String {
    if prefix == "/" {
        return path.to_string();
    }
    let trimmed = &prefix[..prefix.len() - 1];
    match path.strip_prefix(trimmed) {
        Some("") => "/".to_string(),
        Some(rest) => rest.to_string(),
        None => path.to_string(),
    }
}

fn script_request(
    parts: &http::request::Parts,
    host: &str,
    path: &str,
    params: Vec<(String, String)>,
    body: &Bytes,
) -> ScriptRequest {
    ScriptRequest {
        method: parts.method.to_string(),
        url: parts.uri.to_string(),
        path: path.to_string(),
        host: host.to_string(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        params,
        body: body.clone(),
    }
}

fn apply_headers(resp: &mut Response<RespBody>, headers: &[(String, String)]) {
    for (name, value) in headers {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            resp.headers_mut().append(n, v);
        }
    }
}
