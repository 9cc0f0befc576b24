//! Per-target backend pool.
//!
//! # Responsibilities
//! - Map route lookup targets to data backends
//! - Allow targets to be registered while requests are in flight

use std::sync::Arc;

use dashmap::DashMap;

use crate::storage::DataClient;

/// Data backends keyed by target URI.
#[derive(Clone, Default)]
pub struct TargetPool {
    backends: Arc<DashMap<String, Arc<dyn DataClient>>>,
}

impl TargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TargetPool::insert`].
    pub fn with_backend(self, target: impl Into<String>, backend: Arc<dyn DataClient>) -> Self {
        self.insert(target, backend);
        self
    }

    /// Register a backend, replacing any previous one for the same target.
    pub fn insert(&self, target: impl Into<String>, backend: Arc<dyn DataClient>) {
        let target = target.into();
        tracing::debug!(endpoint = %target, "Backend registered");
        self.backends.insert(target, backend);
    }

    pub fn get(&self, target: &str) -> Option<Arc<dyn DataClient>> {
        self.backends.get(target).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, target: &str) -> bool {
        self.backends.contains_key(target)
    }

    /// Registered targets in lexical order.
    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.backends.iter().map(|e| e.key().clone()).collect();
        targets.sort();
        targets
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for TargetPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetPool").field("targets", &self.targets()).finish()
    }
}
