use serde::Deserialize;

/// Listener configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Port to listen on, kept as a string so it can come straight
    /// from environment-templated files
    /// Default: "8080"
    #[serde(default = "default_port")]
    pub port: String,
}

impl ServerConfig {
    /// Listen address derived from the configured port
    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> String {
    "8080".to_string()
}
