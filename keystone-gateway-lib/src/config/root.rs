use serde::Deserialize;

use super::compression::CompressionConfig;
use super::limits::RequestLimits;
use super::scripting::LuaRoutingConfig;
use super::server::ServerConfig;
use super::tenant::Tenant;
use super::tls::TlsConfig;

/// Main configuration structure
///
/// Loaded from a YAML file at startup and immutable afterwards.
/// Unknown fields are rejected at every level.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tenant definitions; at least one is required
    pub tenants: Vec<Tenant>,
    /// Base path under which /health and /tenants are served
    /// Default: "/"
    #[serde(default = "default_admin_base_path")]
    pub admin_base_path: String,
    /// Listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Lua scripted-routing settings
    #[serde(default)]
    pub lua_routing: LuaRoutingConfig,
    /// TLS termination (optional)
    /// If absent or disabled, the gateway listens in plain HTTP mode
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// Response compression settings
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Per-request resource limits
    #[serde(default)]
    pub request_limits: RequestLimits,
}

fn default_admin_base_path() -> String {
    "/".to_string()
}
