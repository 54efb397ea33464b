use std::sync::Arc;

use tracing::warn;

use crate::balancer::ProbeRunner;
use crate::config::Config;
use crate::error::Result;
use crate::middleware::{ConcurrencyLimit, MAX_IN_FLIGHT};
use crate::proxy::{build_shared_client, SharedClient};
use crate::routing::RoutingTable;
use crate::scripting::ScriptEngine;
use crate::tenant::TenantRuntime;

/// Everything a request handler needs, assembled once at startup
pub struct Gateway {
    pub config: Arc<Config>,
    pub table: Arc<RoutingTable>,
    pub client: SharedClient,
    pub engine: Option<Arc<ScriptEngine>>,
    pub limiter: ConcurrencyLimit,
}

impl Gateway {
    pub fn build(config: Config) -> Result<Arc<Self>> {
        let tenants = config
            .tenants
            .iter()
            .map(TenantRuntime::from_config)
            .collect::<Result<Vec<_>>>()?;
        let table = Arc::new(RoutingTable::build(tenants)?);

        let engine = if config.lua_routing.enabled {
            Some(Arc::new(ScriptEngine::build(&config.lua_routing, &config.tenants)?))
        } else {
            if config.tenants.iter().any(|t| !t.lua_routes.is_empty()) {
                warn!("tenants reference lua_routes but lua_routing is disabled; scripts ignored");
            }
            None
        };

        Ok(Arc::new(Self {
            table,
            client: build_shared_client(),
            engine,
            limiter: ConcurrencyLimit::new(MAX_IN_FLIGHT),
            config: Arc::new(config),
        }))
    }

    pub fn start_probes(&self) -> ProbeRunner {
        ProbeRunner::start(self.table.tenants(), self.client.clone())
    }

    /// Release resources on shutdown; idempotent
    pub fn shutdown(&self) {
        if let Some(engine) = &self.engine {
            engine.close();
        }
    }
}
