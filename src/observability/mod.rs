//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! harness / transport / routing produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (route decision and storage request counters)
//!
//! Consumers:
//!     → stderr (fmt layer)
//!     → Prometheus text snapshot printed at the end of a run
//! ```
//!
//! # Design Decisions
//! - Request ID (UUID v4) is attached as a span field on every routed RPC
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
