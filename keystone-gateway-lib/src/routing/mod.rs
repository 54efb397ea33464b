mod pattern;
mod table;

pub use pattern::{PathParams, PathPattern};
pub use table::{strip_port, RouteMatch, RoutingTable};
