use std::sync::Arc;

use keystone_gateway_lib::config::{Service, Tenant};
use keystone_gateway_lib::routing::{strip_port, RoutingTable};
use keystone_gateway_lib::tenant::TenantRuntime;

fn service(name: &str) -> Service {
    Service {
        name: name.to_string(),
        url: format!("http://{name}:9000"),
        health: None,
    }
}

fn tenant(name: &str, domains: &[&str], prefix: Option<&str>) -> Arc<TenantRuntime> {
    let cfg = Tenant {
        name: name.to_string(),
        path_prefix: prefix.map(str::to_string),
        domains: domains.iter().map(|d| d.to_string()).collect(),
        health_interval: 10,
        lua_routes: vec![],
        preserve_host: false,
        services: vec![service(&format!("{name}-svc"))],
    };
    TenantRuntime::from_config(&cfg).expect("build tenant")
}

fn table(tenants: Vec<Arc<TenantRuntime>>) -> RoutingTable {
    RoutingTable::build(tenants).expect("build table")
}

#[test]
fn strips_numeric_port_only() {
    assert_eq!(strip_port("app.example.com:8080"), "app.example.com");
    assert_eq!(strip_port("app.example.com"), "app.example.com");
    assert_eq!(strip_port("[::1]:443"), "[::1]");
    assert_eq!(strip_port("app.example.com:"), "app.example.com:");
    assert_eq!(strip_port("app.example.com:8a0"), "app.example.com:8a0");
}

#[test]
fn matches_host_only_tenant() {
    let t = table(vec![tenant("app", &["app.example.com"], None)]);

    let m = t.match_route("app.example.com", "/anything").expect("match");
    assert_eq!(m.tenant.name, "app");
    assert_eq!(m.prefix, "/");

    assert!(t.match_route("other.example.com", "/anything").is_none());
}

#[test]
fn matches_host_with_port() {
    let t = table(vec![tenant("app", &["app.example.com"], None)]);
    let m = t.match_route("app.example.com:8080", "/").expect("match");
    assert_eq!(m.tenant.name, "app");
}

#[test]
fn matches_prefix_only_tenant() {
    let t = table(vec![tenant("api", &[], Some("/api/"))]);

    let m = t.match_route("anything.test", "/api/users").expect("match");
    assert_eq!(m.tenant.name, "api");
    assert_eq!(m.prefix, "/api/");

    // The slash-less form of the prefix also matches.
    assert!(t.match_route("anything.test", "/api").is_some());
    assert!(t.match_route("anything.test", "/apix").is_none());
    assert!(t.match_route("anything.test", "/other").is_none());
}

#[test]
fn longest_prefix_wins() {
    let t = table(vec![
        tenant("short", &[], Some("/api/")),
        tenant("long", &[], Some("/api/v2/")),
    ]);

    assert_eq!(
        t.match_route("x.test", "/api/v2/users").expect("match").tenant.name,
        "long"
    );
    assert_eq!(
        t.match_route("x.test", "/api/users").expect("match").tenant.name,
        "short"
    );
}

#[test]
fn host_prefix_beats_host_only() {
    let t = table(vec![
        tenant("versioned", &["x.test"], Some("/v2/")),
        tenant("catchall", &["x.test"], None),
    ]);

    assert_eq!(
        t.match_route("x.test", "/v2/ping").expect("match").tenant.name,
        "versioned"
    );
    assert_eq!(
        t.match_route("x.test", "/other").expect("match").tenant.name,
        "catchall"
    );
}

#[test]
fn host_rules_shadow_bare_prefixes() {
    let t = table(vec![
        tenant("hosted", &["x.test"], None),
        tenant("pathed", &[], Some("/api/")),
    ]);

    // A host match wins even though the prefix would also match.
    assert_eq!(
        t.match_route("x.test", "/api/users").expect("match").tenant.name,
        "hosted"
    );
    // Without a host match the prefix applies.
    assert_eq!(
        t.match_route("y.test", "/api/users").expect("match").tenant.name,
        "pathed"
    );
}

#[test]
fn no_match_returns_none() {
    let t = table(vec![
        tenant("app", &["app.example.com"], None),
        tenant("api", &[], Some("/api/")),
    ]);

    assert!(t.match_route("other.test", "/nope").is_none());
}

#[test]
fn host_prefix_longest_wins_within_host() {
    let t = table(vec![
        tenant("a", &["x.test"], Some("/api/")),
        tenant("b", &["x.test"], Some("/api/v1/")),
    ]);

    assert_eq!(
        t.match_route("x.test", "/api/v1/ping").expect("match").tenant.name,
        "b"
    );
    assert_eq!(
        t.match_route("x.test", "/api/other").expect("match").tenant.name,
        "a"
    );
}
