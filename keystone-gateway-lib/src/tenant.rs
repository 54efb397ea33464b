use std::sync::Arc;
use std::time::Duration;

use crate::balancer::BackendPool;
use crate::config;
use crate::error::Result;

/// Runtime view of a configured tenant
///
/// Built once at startup; the routing table hands out shared references
/// and the pool carries all mutable state (liveness, cursor).
pub struct TenantRuntime {
    pub name: String,
    pub domains: Vec<String>,
    /// Normalised path prefix ("/api/"), if this tenant routes by path
    pub path_prefix: Option<String>,
    pub health_interval: Duration,
    pub preserve_host: bool,
    /// Script files (relative to scripts_dir) registering routes here
    pub script_tags: Vec<String>,
    pub pool: BackendPool,
}

impl TenantRuntime {
    pub fn from_config(tenant: &config::Tenant) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            name: tenant.name.clone(),
            domains: tenant.domains.clone(),
            path_prefix: tenant.path_prefix.clone(),
            health_interval: Duration::from_secs(tenant.health_interval.max(1)),
            preserve_host: tenant.preserve_host,
            script_tags: tenant.lua_routes.clone(),
            pool: BackendPool::new(&tenant.services)?,
        }))
    }
}
