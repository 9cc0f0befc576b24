//! Route lookup service configuration.
//!
//! # Data Flow
//! ```text
//! HarnessConfig
//!     → service_config.rs (typed ServiceConfig for the data channel)
//!     → validate() (semantic checks, all errors at once)
//!     → to_json() at the transport boundary
//!     → routing::KeyBuilderMap (compiled grpcKeybuilders)
//! ```
//!
//! # Design Decisions
//! - The document is typed end to end; nothing is interpolated as text
//! - An absent default target is `None`, never an empty-string sentinel
//! - Durations use the protobuf JSON string form

pub mod duration;
pub mod service_config;

pub use service_config::{
    is_valid_target, ExtraKeys, GrpcKeyBuilder, GrpclbPolicy, HeaderKey, LoadBalancingPolicy, PickFirstPolicy,
    RlsPolicy, RouteLookupConfig, ServiceConfig, ServiceConfigError, ServiceMethodName,
};

/// Fully qualified name of the storage data-plane service.
pub const STORAGE_SERVICE: &str = "google.bigtable.v2.Bigtable";

/// Metadata header carrying URL-encoded routing parameters.
pub const REQUEST_PARAMS_HEADER: &str = "x-goog-request-params";

/// Metadata header carrying the `projects/{p}/instances/{i}` resource prefix.
pub const RESOURCE_PREFIX_HEADER: &str = "google-cloud-resource-prefix";
