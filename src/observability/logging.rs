//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber once per process
//! - Resolve the log filter from the environment or configuration
//!
//! # Design Decisions
//! - `RUST_LOG` wins over `observability.log_level`
//! - Human-readable fmt output on stderr; stdout is left for run output

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the config yields a usable directive.
pub const FALLBACK_FILTER: &str = "info";

/// Build the filter: `RUST_LOG`, then the configured level, then `info`.
pub fn resolve_filter(config_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Subsequent calls are ignored.
pub fn init_logging(config_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(resolve_filter(config_level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
