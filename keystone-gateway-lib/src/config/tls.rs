use serde::Deserialize;

/// TLS termination configuration
///
/// Certificates are loaded once at startup; there is no reload.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    /// Terminate TLS on the listener
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Path to the PEM certificate chain
    #[serde(default)]
    pub cert_file: String,
    /// Path to the PEM private key
    #[serde(default)]
    pub key_file: String,
}
