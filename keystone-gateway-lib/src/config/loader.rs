use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use crate::config::Config;
use crate::error::{GatewayError, Result};

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config> {
    let txt = fs::read_to_string(p)
        .map_err(|e| GatewayError::Config(format!("Failed to read config file: {e}")))?;
    let mut cfg: Config = serde_norway::from_str(&txt)
        .map_err(|e| GatewayError::Config(format!("Failed to parse config: {e}")))?;

    validate_config(&mut cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &mut Config) -> Result<()> {
    if cfg.tenants.is_empty() {
        return Err(GatewayError::NoTenants);
    }

    if cfg.server.port.parse::<u16>().is_err() {
        return Err(GatewayError::Config(format!(
            "Invalid server port: {}",
            cfg.server.port
        )));
    }

    if !(1..=9).contains(&cfg.compression.level) {
        return Err(GatewayError::Config(format!(
            "Compression level must be between 1 and 9, got {}",
            cfg.compression.level
        )));
    }

    if !cfg.admin_base_path.starts_with('/') {
        return Err(GatewayError::Config(format!(
            "admin_base_path must start with '/': {}",
            cfg.admin_base_path
        )));
    }

    if let Some(tls) = &cfg.tls {
        if tls.enabled {
            if !Path::new(&tls.cert_file).exists() {
                return Err(GatewayError::Config(format!(
                    "Certificate file not found: {}",
                    tls.cert_file
                )));
            }
            if !Path::new(&tls.key_file).exists() {
                return Err(GatewayError::Config(format!(
                    "Key file not found: {}",
                    tls.key_file
                )));
            }
        }
    }

    let mut names = HashSet::new();
    let mut host_prefix_pairs = HashSet::new();
    let mut host_only = HashSet::new();
    let mut prefix_only = HashSet::new();

    for tenant in &mut cfg.tenants {
        if tenant.name.is_empty() {
            return Err(GatewayError::Config("Tenant with empty name".to_string()));
        }
        if !names.insert(tenant.name.clone()) {
            return Err(GatewayError::Config(format!(
                "Duplicate tenant name: {}",
                tenant.name
            )));
        }

        if tenant.path_prefix.is_none() && tenant.domains.is_empty() {
            return Err(GatewayError::Config(format!(
                "Tenant {} needs a path_prefix, domains, or both",
                tenant.name
            )));
        }

        if let Some(prefix) = &mut tenant.path_prefix {
            if !prefix.starts_with('/') {
                return Err(GatewayError::Config(format!(
                    "Tenant {}: path_prefix must start with '/': {prefix}",
                    tenant.name
                )));
            }
            // Accept the legacy no-trailing-slash form and normalise.
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
        }

        for domain in &tenant.domains {
            if !is_valid_domain(domain) {
                return Err(GatewayError::Config(format!(
                    "Tenant {}: invalid domain: {domain}",
                    tenant.name
                )));
            }
        }

        // Ambiguous rules would make longest-prefix ordering tie; reject them.
        match (&tenant.path_prefix, tenant.domains.is_empty()) {
            (Some(prefix), false) => {
                for domain in &tenant.domains {
                    if !host_prefix_pairs.insert((domain.clone(), prefix.clone())) {
                        return Err(GatewayError::Config(format!(
                            "Tenant {}: duplicate (domain, path_prefix) pair ({domain}, {prefix})",
                            tenant.name
                        )));
                    }
                }
            }
            (None, false) => {
                for domain in &tenant.domains {
                    if !host_only.insert(domain.clone()) {
                        return Err(GatewayError::Config(format!(
                            "Tenant {}: duplicate domain: {domain}",
                            tenant.name
                        )));
                    }
                }
            }
            (Some(prefix), true) => {
                if !prefix_only.insert(prefix.clone()) {
                    return Err(GatewayError::Config(format!(
                        "Tenant {}: duplicate path_prefix: {prefix}",
                        tenant.name
                    )));
                }
            }
            (None, true) => unreachable!("rule shape checked above"),
        }

        validate_services(tenant)?;
    }

    Ok(())
}

fn validate_services(tenant: &crate::config::Tenant) -> Result<()> {
    if tenant.services.is_empty() {
        return Err(GatewayError::Config(format!(
            "Tenant {} has no services",
            tenant.name
        )));
    }

    for svc in &tenant.services {
        let uri: http::Uri = svc.url.parse().map_err(|e| {
            GatewayError::Config(format!(
                "Tenant {}, service {}: invalid url {}: {e}",
                tenant.name, svc.name, svc.url
            ))
        })?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                return Err(GatewayError::Config(format!(
                    "Tenant {}, service {}: unsupported scheme {other} (upstreams are plain http; terminate TLS next to the backend)",
                    tenant.name, svc.name
                )));
            }
            None => {
                return Err(GatewayError::Config(format!(
                    "Tenant {}, service {}: url must be absolute: {}",
                    tenant.name, svc.name, svc.url
                )));
            }
        }
        if uri.host().is_none() {
            return Err(GatewayError::Config(format!(
                "Tenant {}, service {}: url has no host: {}",
                tenant.name, svc.name, svc.url
            )));
        }
        if let Some(health) = &svc.health {
            if !health.starts_with('/') {
                return Err(GatewayError::Config(format!(
                    "Tenant {}, service {}: health path must start with '/': {health}",
                    tenant.name, svc.name
                )));
            }
        }
    }

    Ok(())
}

/// A domain is a dotted name, not an IP literal, without whitespace.
fn is_valid_domain(domain: &str) -> bool {
    !domain.is_empty()
        && domain.contains('.')
        && !domain.contains(char::is_whitespace)
        && domain.parse::<IpAddr>().is_err()
}
