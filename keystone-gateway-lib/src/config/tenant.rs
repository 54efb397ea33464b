use serde::{Deserialize, Deserializer};

/// Tenant configuration
///
/// A tenant owns a routing rule (by host, by path prefix, or both),
/// a set of backend services, and optional Lua route scripts.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Tenant {
    /// Unique tenant name
    pub name: String,
    /// URL path prefix this tenant claims (e.g., "/api/")
    /// Must start with "/"; a missing trailing "/" is accepted and
    /// normalised at load time
    #[serde(default)]
    pub path_prefix: Option<String>,
    /// Host names this tenant claims (e.g., "app.example.com")
    #[serde(default)]
    pub domains: Vec<String>,
    /// Seconds between health probes for this tenant's services
    /// Default: 10
    #[serde(default = "default_health_interval")]
    pub health_interval: u64,
    /// Lua scripts registering routes for this tenant, relative to
    /// `lua_routing.scripts_dir`; a single string or a list
    #[serde(default, deserialize_with = "string_or_list")]
    pub lua_routes: Vec<String>,
    /// Keep the client's original Host header when forwarding
    /// When false (default), backends receive their own authority as Host
    #[serde(default)]
    pub preserve_host: bool,
    /// Backend services; at least one is required
    pub services: Vec<Service>,
}

/// Backend service configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Service {
    /// Service name, used in logs and the admin listing
    pub name: String,
    /// Absolute base URL of the backend (scheme and host required)
    /// Example: "http://backend-1:9000"
    pub url: String,
    /// Health-probe path, beginning with "/" (e.g., "/healthz")
    /// If absent, the service is assumed always alive and never probed
    #[serde(default)]
    pub health: Option<String>,
}

fn default_health_interval() -> u64 {
    10
}

/// Accept either `lua_routes: "one.lua"` or `lua_routes: ["a.lua", "b.lua"]`
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
