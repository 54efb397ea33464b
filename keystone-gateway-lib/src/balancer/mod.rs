mod pool;
mod probe;

pub use pool::{Backend, BackendPool};
pub use probe::ProbeRunner;
