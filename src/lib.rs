//! Storage integration harness with a route-lookup data channel.

pub mod cli;
pub mod config;
pub mod harness;
pub mod lifecycle;
pub mod observability;
pub mod rls;
pub mod routing;
pub mod storage;
pub mod transport;

pub use config::HarnessConfig;
pub use harness::{Harness, HarnessError, RunReport, Sessions};
pub use routing::{NoRouteError, RoutingTable};
