//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT → trigger shutdown
//!
//! Shutdown (shutdown.rs):
//!     trigger → main stops the run → background reload task exits
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
