//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Outgoing RPC (authority, service, method, metadata)
//!     → key.rs (key builder → RouteKey)
//!     → shared.rs (load current table snapshot)
//!     → router.rs (first matching rule, else default target)
//!     → matcher.rs (evaluate rule patterns)
//!     → Return: Decision or NoRouteError
//!
//! Table Compilation (at startup, or on reload):
//!     RuleConfig[]
//!     → Parse patterns, keep insertion order
//!     → Freeze as immutable RoutingTable
//!     → Publish through SharedRouter (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Tables compiled once, immutable at runtime
//! - No regex in hot path (exact term matching only)
//! - Deterministic: same key always resolves to the same target
//! - First match wins (ordered by insertion)

pub mod key;
pub mod matcher;
pub mod router;
pub mod shared;

pub use key::{KeyBuilder, KeyBuilderMap, RequestMetadata, RouteKey};
pub use matcher::{Matcher, Pattern, PatternError};
pub use router::{Decision, DecisionSource, DecisionTtl, NoRouteError, Rule, RuleError, RoutingTable};
pub use shared::SharedRouter;
