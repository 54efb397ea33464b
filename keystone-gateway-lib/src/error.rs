use thiserror::Error;

/// Fatal errors raised during startup or shutdown
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("No tenants configured")]
    NoTenants,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
