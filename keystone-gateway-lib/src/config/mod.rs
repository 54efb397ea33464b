mod compression;
mod limits;
mod loader;
mod root;
mod scripting;
mod server;
mod tenant;
mod tls;

pub use compression::CompressionConfig;
pub use limits::RequestLimits;
pub use loader::load_from_path;
pub use root::Config;
pub use scripting::LuaRoutingConfig;
pub use server::ServerConfig;
pub use tenant::{Service, Tenant};
pub use tls::TlsConfig;
