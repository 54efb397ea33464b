use std::io::Write;

use keystone_gateway_lib::config::load_from_path;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(yaml.as_bytes()).expect("write temp config");
    file
}

#[test]
fn loads_minimal_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
"#,
    );

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.tenants.len(), 1);
    assert_eq!(cfg.tenants[0].name, "api");
    assert_eq!(cfg.server.port, "8080");
    assert_eq!(cfg.admin_base_path, "/");
    assert!(cfg.compression.enabled);
    assert_eq!(cfg.compression.level, 5);
    assert!(!cfg.lua_routing.enabled);
    assert_eq!(cfg.tenants[0].health_interval, 10);
    Ok(())
}

#[test]
fn normalises_path_prefix_trailing_slash() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api
    services:
      - name: backend-1
        url: http://localhost:9000
"#,
    );

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.tenants[0].path_prefix.as_deref(), Some("/api/"));
    Ok(())
}

#[test]
fn rejects_prefix_without_leading_slash() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: api/
    services:
      - name: backend-1
        url: http://localhost:9000
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_unknown_fields() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
surprise: true
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_duplicate_tenant_names() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
  - name: api
    path_prefix: /other/
    services:
      - name: backend-2
        url: http://localhost:9001
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_tenant_without_rule() {
    let file = write_config(
        r#"
tenants:
  - name: api
    services:
      - name: backend-1
        url: http://localhost:9000
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_invalid_domains() {
    for domain in ["nodot", "has space.com", "192.168.1.1"] {
        let file = write_config(&format!(
            r#"
tenants:
  - name: api
    domains: ["{domain}"]
    services:
      - name: backend-1
        url: http://localhost:9000
"#
        ));

        assert!(
            load_from_path(file.path()).is_err(),
            "domain {domain} should be rejected"
        );
    }
}

#[test]
fn rejects_service_without_scheme() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: localhost:9000
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_health_path_without_slash() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
        health: healthz
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_duplicate_prefix_only_tenants() {
    let file = write_config(
        r#"
tenants:
  - name: one
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
  - name: two
    path_prefix: /api
    services:
      - name: backend-2
        url: http://localhost:9001
"#,
    );

    // Both normalise to "/api/"; a lookup could never tie-break them.
    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn rejects_out_of_range_compression_level() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
compression:
  level: 12
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}

#[test]
fn accepts_lua_routes_as_string_or_list() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    let file = write_config(
        r#"
tenants:
  - name: one
    path_prefix: /one/
    lua_routes: single.lua
    services:
      - name: backend-1
        url: http://localhost:9000
  - name: two
    path_prefix: /two/
    lua_routes: [a.lua, b.lua]
    services:
      - name: backend-2
        url: http://localhost:9001
"#,
    );

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.tenants[0].lua_routes, vec!["single.lua"]);
    assert_eq!(cfg.tenants[1].lua_routes, vec!["a.lua", "b.lua"]);
    Ok(())
}

#[test]
fn rejects_missing_tls_files_when_enabled() {
    let file = write_config(
        r#"
tenants:
  - name: api
    path_prefix: /api/
    services:
      - name: backend-1
        url: http://localhost:9000
tls:
  enabled: true
  cert_file: /nonexistent/server.crt
  key_file: /nonexistent/server.key
"#,
    );

    assert!(load_from_path(file.path()).is_err());
}
