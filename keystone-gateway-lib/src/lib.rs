#![forbid(unsafe_code)]

pub mod admin;
pub mod balancer;
pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod proxy;
pub mod routing;
pub mod scripting;
pub mod tenant;
pub mod tls;

pub use balancer::{Backend, BackendPool, ProbeRunner};
pub use config::{load_from_path, Config};
pub use error::{GatewayError, Result};
pub use gateway::Gateway;
pub use proxy::{run, SharedClient};
pub use routing::{PathPattern, RouteMatch, RoutingTable};
pub use scripting::ScriptEngine;
pub use tenant::TenantRuntime;
pub use tls::build_tls_acceptor;
