//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → cli overrides
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable for the run)
//!
//! With --watch:
//!     watcher.rs detects change
//!     → loader.rs parses (Result forwarded as is)
//!     → cli overrides, then validation.rs
//!     → only [routing] is applied: the route table is swapped in place
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so a run needs no config file at all
//! - Validation separates syntactic (serde) from semantic checks
//! - Storage identities never change mid-run; only routes hot-reload

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, read_config, ConfigError};
pub use schema::{
    ChannelConfig, EndpointConfig, HarnessConfig, ObservabilityConfig, RlsConfig, RoutingConfig, RuleConfig,
    RunConfig, StorageConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::{ConfigUpdate, ConfigWatcher};
