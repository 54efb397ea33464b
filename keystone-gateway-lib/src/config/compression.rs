use serde::Deserialize;

/// Response compression configuration
///
/// Responses whose media type is in `content_types` are gzip-compressed
/// when the client accepts it and the upstream has not already encoded
/// the body.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Enable response compression
    /// Default: true
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Compression level, 1 (fastest) to 9 (smallest)
    /// Default: 5
    #[serde(default = "default_level")]
    pub level: u32,
    /// Media types eligible for compression
    #[serde(default = "default_content_types")]
    pub content_types: Vec<String>,
}

impl CompressionConfig {
    /// Whether a response `Content-Type` header value is eligible.
    /// Parameters (e.g. "; charset=utf-8") are ignored.
    pub fn should_compress(&self, content_type: &str) -> bool {
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        self.content_types.iter().any(|t| t == &media_type)
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            content_types: default_content_types(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_level() -> u32 {
    5
}

fn default_content_types() -> Vec<String> {
    [
        "text/html",
        "text/css",
        "text/javascript",
        "application/json",
        "application/xml",
        "text/plain",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
