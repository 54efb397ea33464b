use http::header::{HeaderMap, HeaderName};
use rand::distr::Alphanumeric;
use rand::Rng;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const GENERATED_ID_LEN: usize = 16;

/// Propagate the client's X-Request-Id, or mint a random token
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_id)
}

fn generate_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(char::from)
        .collect()
}
