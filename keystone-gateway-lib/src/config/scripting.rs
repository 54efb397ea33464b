use serde::Deserialize;
use std::path::PathBuf;

/// Lua scripted-routing configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LuaRoutingConfig {
    /// Enable scripted routes
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
    /// Directory holding the script files referenced by tenants
    /// Default: "./scripts"
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,
    /// Scripts run once at startup, outside any tenant; they may
    /// register cross-cutting middleware on the root path
    #[serde(default)]
    pub global_scripts: Vec<String>,
}

impl Default for LuaRoutingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scripts_dir: default_scripts_dir(),
            global_scripts: Vec::new(),
        }
    }
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("./scripts")
}
