//! Lock-free shared access to the current routing table.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::routing::{Decision, NoRouteError, RouteKey, RoutingTable};

/// Cloneable handle to the active [`RoutingTable`].
///
/// Readers load a snapshot per lookup; `replace` publishes a whole new table.
/// A lookup that started before a swap finishes against the old snapshot.
#[derive(Debug, Clone)]
pub struct SharedRouter {
    current: Arc<ArcSwap<RoutingTable>>,
}

impl SharedRouter {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    pub fn resolve(&self, key: &RouteKey) -> Result<Decision, NoRouteError> {
        self.current.load().resolve(key)
    }

    /// The table lookups currently run against.
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        self.current.load_full()
    }

    /// Publish a new table, returning the one it replaced.
    pub fn replace(&self, table: RoutingTable) -> Arc<RoutingTable> {
        let previous = self.current.swap(Arc::new(table));
        tracing::info!(
            rules = self.current.load().rules().len(),
            previous_rules = previous.rules().len(),
            "Routing table replaced"
        );
        previous
    }
}
