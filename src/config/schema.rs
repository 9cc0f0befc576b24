//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::DecisionTtl;

/// Root configuration for a harness run.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Which project, instance, table and cells to exercise.
    pub storage: StorageConfig,

    /// Admin, data, lookup and default-target endpoints.
    pub endpoints: EndpointConfig,

    /// Route lookup policy parameters.
    pub rls: RlsConfig,

    /// Local route table consulted by the data channel.
    pub routing: RoutingConfig,

    /// Run behaviour (teardown, settle delay, routed or direct data path).
    pub run: RunConfig,

    /// Data channel limits.
    pub channel: ChannelConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl HarnessConfig {
    /// Default target for the route lookup policy, if enabled and non-empty.
    pub fn default_target(&self) -> Option<String> {
        if self.rls.enable_default_target && !self.endpoints.default_target.is_empty() {
            Some(self.endpoints.default_target.clone())
        } else {
            None
        }
    }

    /// `projects/{project}/instances/{instance}`
    pub fn resource_prefix(&self) -> String {
        format!(
            "projects/{}/instances/{}",
            self.storage.project_id, self.storage.instance_id
        )
    }

    /// `projects/{project}/instances/{instance}/tables/{table}`
    pub fn table_name(&self) -> String {
        format!("{}/tables/{}", self.resource_prefix(), self.storage.table_id)
    }

    /// Decision validity window, with `max_age` capped and `stale_age` clamped to it.
    pub fn decision_ttl(&self) -> DecisionTtl {
        DecisionTtl::new(
            Duration::from_secs(self.rls.max_age_secs),
            Duration::from_secs(self.rls.stale_age_secs),
        )
    }

    /// App profile with the empty string treated as "service default".
    pub fn app_profile(&self) -> Option<&str> {
        self.storage.app_profile.as_deref().filter(|p| !p.is_empty())
    }
}

/// Storage resources the run touches.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub project_id: String,
    pub instance_id: String,
    pub table_id: String,
    pub column_family: String,
    pub column_qualifier: String,

    /// Row keys are `{row_key_prefix}{index}`.
    pub row_key_prefix: String,

    /// Application profile; unset uses the service's default profile.
    pub app_profile: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            project_id: "directpath-prod-manual-testing".to_string(),
            instance_id: "blackbox-us-central1-b".to_string(),
            table_id: "rls-test-table".to_string(),
            column_family: "cf1".to_string(),
            column_qualifier: "greeting".to_string(),
            row_key_prefix: "row_key_".to_string(),
            app_profile: None,
        }
    }
}

/// Service endpoints, as channel target URIs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub admin: String,

    /// Data plane target; also the fallback when no route is found.
    pub data: String,

    pub lookup_service: String,

    /// Used only when `rls.enable_default_target` is set.
    pub default_target: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            admin: "dns:///test-bigtableadmin.sandbox.googleapis.com".to_string(),
            data: "dns:///test-bigtable.sandbox.googleapis.com".to_string(),
            lookup_service: "dns:///test-bigtablerls.sandbox.googleapis.com".to_string(),
            default_target: "dns:///test-bigtable.sandbox.googleapis.com".to_string(),
        }
    }
}

/// Route lookup policy parameters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RlsConfig {
    /// Lookup RPC timeout in seconds.
    pub lookup_timeout_secs: u64,

    /// How long a decision may be used, in seconds (capped at 300).
    pub max_age_secs: u64,

    /// Age after which a decision should be refreshed, in seconds.
    pub stale_age_secs: u64,

    /// Decision cache budget handed to the policy.
    pub cache_size_bytes: i64,

    /// Whether to put `endpoints.default_target` into the policy.
    pub enable_default_target: bool,
}

impl Default for RlsConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_secs: 10,
            max_age_secs: 300,
            stale_age_secs: 240,
            cache_size_bytes: 1000,
            enable_default_target: false,
        }
    }
}

/// Route table configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Rules in precedence order (first match wins).
    pub rules: Vec<RuleConfig>,
}

/// One routing rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RuleConfig {
    /// `*` or comma-separated `name=value` terms (`name=*` for presence).
    pub pattern: String,

    /// Target URI the rule routes to.
    pub target: String,
}

/// Run behaviour.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Leave the table in place at the end of the run.
    pub skip_table_deletion: bool,

    /// Delay between table creation and the first write, in seconds.
    pub table_creation_wait_secs: u64,

    /// Route data RPCs through the lookup-driven channel.
    pub use_route_lookup: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            skip_table_deletion: false,
            table_creation_wait_secs: 15,
            use_route_lookup: true,
        }
    }
}

/// Data channel limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum outgoing message size in bytes.
    pub max_send_message_bytes: usize,

    /// Maximum incoming message size in bytes.
    pub max_recv_message_bytes: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_send_message_bytes: 1 << 28,
            max_recv_message_bytes: 1 << 28,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "rls_harness=debug").
    pub log_level: String,

    /// Print the Prometheus text snapshot when the run ends.
    pub print_metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            print_metrics: false,
        }
    }
}
