use http::StatusCode;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is turned into a synthetic error response
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Describes things that can go wrong while serving one request
#[derive(Debug, Error, Clone)]
pub enum HttpError {
    #[error("no tenant matched")]
    NoTenantMatched,

    #[error("no live backends")]
    NoLiveBackends,

    #[error("too many requests in flight")]
    Overloaded,

    #[error("request body too large")]
    BodyTooLarge,

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("failed to build upstream request: {0}")]
    UpstreamRequest(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("script timed out")]
    ScriptTimeout,

    #[error("script error: {0}")]
    Script(String),
}

impl From<HttpError> for StatusCode {
    fn from(e: HttpError) -> StatusCode {
        match e {
            HttpError::NoTenantMatched => StatusCode::NOT_FOUND,
            HttpError::NoLiveBackends => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            HttpError::BodyRead(_) => StatusCode::BAD_REQUEST,
            HttpError::InvalidUri(_) => StatusCode::BAD_REQUEST,
            HttpError::UpstreamRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Upstream(_) => StatusCode::BAD_GATEWAY,
            HttpError::ScriptTimeout => StatusCode::REQUEST_TIMEOUT,
            HttpError::Script(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
