use serde::Deserialize;

/// Per-request resource limits
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RequestLimits {
    /// Maximum request body size in bytes; larger bodies yield 413
    /// Default: 10 MiB
    #[serde(default = "default_max_body_size")]
    pub max_body_size: u64,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self { max_body_size: default_max_body_size() }
    }
}

fn default_max_body_size() -> u64 {
    10 * 1024 * 1024
}
