use std::sync::Arc;

use ahash::AHashMap;

use crate::error::Result;
use crate::tenant::TenantRuntime;

/// Result of a routing lookup
///
/// `prefix` is the matched path prefix; "/" means host-mode (the path
/// reaches the backend unchanged).
pub struct RouteMatch {
    pub tenant: Arc<TenantRuntime>,
    pub prefix: String,
}

/// Startup-built index from (host, path) to tenant
///
/// Three sub-indices: host+prefix, host-only, prefix-only. Prefix lists
/// are sorted longest-first so the longest match wins. Read-only after
/// construction.
pub struct RoutingTable {
    host_prefix: AHashMap<String, Vec<(String, Arc<TenantRuntime>)>>,
    host_only: AHashMap<String, Arc<TenantRuntime>>,
    prefix_only: Vec<(String, Arc<TenantRuntime>)>,
    tenants: Vec<Arc<TenantRuntime>>,
}

impl RoutingTable {
    pub fn build(tenants: Vec<Arc<TenantRuntime>>) -> Result<Self> {
        let mut host_prefix: AHashMap<String, Vec<(String, Arc<TenantRuntime>)>> = AHashMap::new();
        let mut host_only = AHashMap::new();
        let mut prefix_only = Vec::new();

        for tenant in &tenants {
            match (&tenant.path_prefix, tenant.domains.is_empty()) {
                (Some(prefix), false) => {
                    for domain in &tenant.domains {
                        host_prefix
                            .entry(domain.clone())
                            .or_default()
                            .push((prefix.clone(), Arc::clone(tenant)));
                    }
                }
                (None, false) => {
                    for domain in &tenant.domains {
                        host_only.insert(domain.clone(), Arc::clone(tenant));
                    }
                }
                (Some(prefix), true) => {
                    prefix_only.push((prefix.clone(), Arc::clone(tenant)));
                }
                (None, true) => {}
            }
        }

        for list in host_prefix.values_mut() {
            list.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }
        prefix_only.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        Ok(Self { host_prefix, host_only, prefix_only, tenants })
    }

    /// Resolve a (host, path) pair to a tenant
    ///
    /// Host rules win over bare prefixes; within a host, the longest
    /// matching prefix wins.
    pub fn match_route(&self, host: &str, path: &str) -> Option<RouteMatch> {
        let host = strip_port(host);

        if let Some(list) = self.host_prefix.get(host) {
            for (prefix, tenant) in list {
                if prefix_matches(prefix, path) {
                    return Some(RouteMatch {
                        tenant: Arc::clone(tenant),
                        prefix: prefix.clone(),
                    });
                }
            }
        }

        if let Some(tenant) = self.host_only.get(host) {
            return Some(RouteMatch {
                tenant: Arc::clone(tenant),
                prefix: "/".to_string(),
            });
        }

        for (prefix, tenant) in &self.prefix_only {
            if prefix_matches(prefix, path) {
                return Some(RouteMatch {
                    tenant: Arc::clone(tenant),
                    prefix: prefix.clone(),
                });
            }
        }

        None
    }

    /// Snapshot of every tenant, for the admin listing
    pub fn tenants(&self) -> &[Arc<TenantRuntime>] {
        &self.tenants
    }
}

/// Drop a trailing `:port` (digits only) from a Host header value
pub fn strip_port(host: &str) -> &str {
    match host.rfind(':') {
        Some(idx) => {
            let port = &host[idx + 1..];
            if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
                &host[..idx]
            } else {
                host
            }
        }
        None => host,
    }
}

/// Prefixes are normalised to end in '/'; a request for exactly the
/// prefix without its trailing slash also matches.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    path.starts_with(prefix) || path == &prefix[..prefix.len() - 1]
}
