//! Route keys and the key builders that extract them from requests.
//!
//! # Responsibilities
//! - Describe an outgoing RPC (authority, service, method, metadata)
//! - Select the key builder whose names cover the RPC
//! - Copy configured headers, extra keys and constant keys into a `RouteKey`
//!
//! # Design Decisions
//! - Header names are compared case-insensitively (metadata keys are lowercase on the wire)
//! - First present header among a key's `names` wins
//! - No matching builder yields an empty key, never an error

use std::fmt;

use crate::rls::GrpcKeyBuilder;

/// Ordered `(name, value)` pairs extracted from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RouteKey {
    entries: Vec<(String, String)>,
}

impl RouteKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a key from pairs, keeping their order. Repeated names keep their first value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().fold(Self::new(), |key, (k, v)| key.with(k, v))
    }

    /// Append an entry. A name that is already present keeps its first value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if self.get(&name).is_none() {
            self.entries.push((name, value.into()));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, "}}")
    }
}

/// The parts of an outgoing RPC that key builders can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    /// Channel authority, e.g. `test-bigtable.sandbox.googleapis.com`.
    pub host: String,
    /// Fully qualified service, e.g. `google.bigtable.v2.Bigtable`.
    pub service: String,
    pub method: String,
    /// Lowercase header name → value, in insertion order.
    pub headers: Vec<(String, String)>,
}

impl RequestMetadata {
    pub fn new(host: impl Into<String>, service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
            method: method.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into().to_lowercase(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A compiled key builder.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    /// `(service, method)`; `None` method covers every method of the service.
    names: Vec<(String, Option<String>)>,
    /// `(key name, candidate header names)`
    headers: Vec<(String, Vec<String>)>,
    host_key: Option<String>,
    service_key: Option<String>,
    method_key: Option<String>,
    constant_keys: Vec<(String, String)>,
}

impl KeyBuilder {
    pub fn covers(&self, service: &str, method: &str) -> bool {
        self.names
            .iter()
            .any(|(s, m)| s == service && m.as_deref().map_or(true, |m| m == method))
    }

    pub fn build(&self, request: &RequestMetadata) -> RouteKey {
        let mut key = RouteKey::new();
        for (name, candidates) in &self.headers {
            if let Some(value) = candidates.iter().find_map(|h| request.header(h)) {
                key = key.with(name.as_str(), value);
            }
        }
        if let Some(name) = &self.host_key {
            key = key.with(name.as_str(), request.host.as_str());
        }
        if let Some(name) = &self.service_key {
            key = key.with(name.as_str(), request.service.as_str());
        }
        if let Some(name) = &self.method_key {
            key = key.with(name.as_str(), request.method.as_str());
        }
        for (name, value) in &self.constant_keys {
            key = key.with(name.as_str(), value.as_str());
        }
        key
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

impl From<&GrpcKeyBuilder> for KeyBuilder {
    fn from(config: &GrpcKeyBuilder) -> Self {
        Self {
            names: config
                .names
                .iter()
                .map(|n| (n.service.clone(), non_empty(&n.method)))
                .collect(),
            headers: config
                .headers
                .iter()
                .map(|h| (h.key.clone(), h.names.clone()))
                .collect(),
            host_key: non_empty(&config.extra_keys.host),
            service_key: non_empty(&config.extra_keys.service),
            method_key: non_empty(&config.extra_keys.method),
            constant_keys: config
                .constant_keys
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Ordered key builders; the first one covering the RPC is used.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilderMap {
    builders: Vec<KeyBuilder>,
}

impl KeyBuilderMap {
    pub fn new(builders: Vec<KeyBuilder>) -> Self {
        Self { builders }
    }

    pub fn from_config(configs: &[GrpcKeyBuilder]) -> Self {
        Self::new(configs.iter().map(KeyBuilder::from).collect())
    }

    /// Build the route key for a request; empty when no builder covers it.
    pub fn build(&self, request: &RequestMetadata) -> RouteKey {
        self.builders
            .iter()
            .find(|b| b.covers(&request.service, &request.method))
            .map(|b| b.build(request))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}
