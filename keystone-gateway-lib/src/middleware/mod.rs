mod access_log;
mod compress;
mod limits;
mod path_clean;
mod real_ip;
mod request_id;

pub use access_log::log_request;
pub use compress::maybe_compress;
pub use limits::{read_body_capped, ConcurrencyLimit};
pub use path_clean::clean;
pub use real_ip::client_ip;
pub use request_id::{request_id, REQUEST_ID_HEADER};

use std::time::Duration;

/// Wall-clock deadline for one request, middleware and handler included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// In-flight request cap; excess requests are rejected with 503
pub const MAX_IN_FLIGHT: usize = 100;
