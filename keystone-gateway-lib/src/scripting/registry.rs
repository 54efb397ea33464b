use std::sync::Arc;

use ahash::AHashMap;
use http::Method;

use crate::routing::{PathParams, PathPattern};

/// A scripted route installed during registration
#[derive(Clone)]
pub struct ScriptRoute {
    pub tenant: String,
    /// Script file name the handler lives in
    pub tag: String,
    pub method: Method,
    pub pattern: PathPattern,
    /// Name of the handler function in the script's globals
    pub function: String,
}

/// A pattern-scoped middleware installed during registration
#[derive(Clone)]
pub struct ScriptMiddleware {
    pub tag: String,
    pub pattern: PathPattern,
    pub function: String,
}

/// Everything scripts registered at startup; read-only during dispatch
#[derive(Default)]
pub struct ScriptRegistry {
    /// (tenant, tag) → script source
    sources: AHashMap<(String, String), Arc<str>>,
    /// tenant → routes in registration order
    routes: AHashMap<String, Vec<ScriptRoute>>,
    /// tenant → middlewares in registration order
    middlewares: AHashMap<String, Vec<ScriptMiddleware>>,
    /// root-scoped middlewares from global scripts
    globals: Vec<ScriptMiddleware>,
    /// tag → global script source
    global_sources: AHashMap<String, Arc<str>>,
}

impl ScriptRegistry {
    pub fn add_tenant_script(
        &mut self,
        tenant: &str,
        tag: &str,
        source: Arc<str>,
        routes: Vec<ScriptRoute>,
        middlewares: Vec<ScriptMiddleware>,
    ) {
        self.sources
            .insert((tenant.to_string(), tag.to_string()), source);
        self.routes
            .entry(tenant.to_string())
            .or_default()
            .extend(routes);
        self.middlewares
            .entry(tenant.to_string())
            .or_default()
            .extend(middlewares);
    }

    pub fn add_global_script(
        &mut self,
        tag: &str,
        source: Arc<str>,
        middlewares: Vec<ScriptMiddleware>,
    ) {
        self.global_sources.insert(tag.to_string(), source);
        self.globals.extend(middlewares);
    }

    /// First registered route matching (method, tenant-local path)
    pub fn find_route(
        &self,
        tenant: &str,
        method: &Method,
        local_path: &str,
    ) -> Option<(&ScriptRoute, PathParams)> {
        self.routes.get(tenant)?.iter().find_map(|route| {
            if &route.method != method {
                return None;
            }
            route.pattern.matches(local_path).map(|params| (route, params))
        })
    }

    /// Tenant middlewares whose scope covers the tenant-local path
    pub fn middlewares_for(&self, tenant: &str, local_path: &str) -> Vec<&ScriptMiddleware> {
        self.middlewares
            .get(tenant)
            .map(|list| {
                list.iter()
                    .filter(|mw| mw.pattern.matches_scope(local_path))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Global middlewares whose scope covers the full path
    pub fn global_middlewares_for(&self, path: &str) -> Vec<&ScriptMiddleware> {
        self.globals
            .iter()
            .filter(|mw| mw.pattern.matches_scope(path))
            .collect()
    }

    pub fn has_global_middlewares(&self) -> bool {
        !self.globals.is_empty()
    }

    pub fn source(&self, tenant: &str, tag: &str) -> Option<Arc<str>> {
        self.sources
            .get(&(tenant.to_string(), tag.to_string()))
            .cloned()
    }

    pub fn global_source(&self, tag: &str) -> Option<Arc<str>> {
        self.global_sources.get(tag).cloned()
    }
}
