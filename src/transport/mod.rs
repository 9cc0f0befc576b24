//! Data channel transport.
//!
//! # Data Flow
//! ```text
//! ServiceConfig + ChannelOptions + SharedRouter
//!     → channel.rs (validated channel, key builders, pick with fallback)
//!     → routed.rs  (RoutedDataClient: metadata, limits, dispatch)
//!     → pool.rs    (TargetPool: target → DataClient)
//! ```
//!
//! # Design Decisions
//! - The channel owns the fixed target used when the table has no answer
//! - Backends are looked up per request, so reloads can add targets

pub mod channel;
pub mod pool;
pub mod routed;

pub use channel::{authority_of, Channel, ChannelError, ChannelOptions, Pick, PickOutcome};
pub use pool::TargetPool;
pub use routed::{RoutedDataClient, REQUEST_ID_HEADER};
