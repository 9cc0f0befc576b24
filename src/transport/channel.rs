//! Data channel: service config, key builders and target picking.
//!
//! # Responsibilities
//! - Validate the service config before the channel is usable
//! - Compile the route lookup key builders once
//! - Pick a target per request, falling back to the fixed target
//!
//! # Design Decisions
//! - `NoRouteError` is never surfaced to callers; it is a fallback signal
//! - The route table is shared, so a reload is seen by the next pick

use thiserror::Error;

use crate::observability::metrics;
use crate::rls::{is_valid_target, ServiceConfig, ServiceConfigError};
use crate::routing::{Decision, DecisionSource, KeyBuilderMap, NoRouteError, RequestMetadata, SharedRouter};

/// Errors raised while constructing a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel target {0:?}")]
    InvalidTarget(String),

    #[error("invalid service config: {}", join(.0))]
    ServiceConfig(Vec<ServiceConfigError>),
}

fn join(errors: &[ServiceConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Channel-level options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub max_send_message_bytes: usize,
    pub max_recv_message_bytes: usize,
    /// Application profile sent with every request.
    pub app_profile: Option<String>,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            max_send_message_bytes: 1 << 28,
            max_recv_message_bytes: 1 << 28,
            app_profile: None,
        }
    }
}

/// How a pick was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    /// Matched the rule at this index.
    Rule(usize),
    /// No rule matched; the table's default target was used.
    Default,
    /// The table had no answer; the channel's own target was used.
    Fallback,
}

impl PickOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PickOutcome::Rule(_) => "rule",
            PickOutcome::Default => "default",
            PickOutcome::Fallback => "fallback",
        }
    }
}

/// The target chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub target: String,
    pub outcome: PickOutcome,
}

impl Pick {
    /// Turn a route table answer into a pick, using `fallback` when there is none.
    pub fn from_resolution(resolved: Result<Decision, NoRouteError>, fallback: &str) -> Self {
        match resolved {
            Ok(decision) => Self {
                target: decision.target,
                outcome: match decision.source {
                    DecisionSource::Rule(index) => PickOutcome::Rule(index),
                    DecisionSource::Default => PickOutcome::Default,
                },
            },
            Err(e) => {
                tracing::debug!(error = %e, fallback = %fallback, "Falling back to channel target");
                Self {
                    target: fallback.to_string(),
                    outcome: PickOutcome::Fallback,
                }
            }
        }
    }
}

/// A channel to the data service driven by the route lookup policy.
#[derive(Debug)]
pub struct Channel {
    target: String,
    authority: String,
    options: ChannelOptions,
    service_config: ServiceConfig,
    key_builders: KeyBuilderMap,
    router: SharedRouter,
}

impl Channel {
    /// Create a channel to `target`, which also serves as the fallback.
    pub fn new(
        target: impl Into<String>,
        service_config: ServiceConfig,
        options: ChannelOptions,
        router: SharedRouter,
    ) -> Result<Self, ChannelError> {
        let target = target.into();
        if !is_valid_target(&target) {
            return Err(ChannelError::InvalidTarget(target));
        }
        service_config.validate().map_err(ChannelError::ServiceConfig)?;

        let key_builders = service_config
            .rls_policy()
            .map(|rls| KeyBuilderMap::from_config(&rls.route_lookup_config.grpc_keybuilders))
            .unwrap_or_default();

        match service_config.to_json() {
            Ok(json) => tracing::debug!(endpoint = %target, service_config = %json, "Data channel service config"),
            Err(e) => tracing::warn!(error = %e, "Service config could not be rendered"),
        }

        tracing::info!(
            endpoint = %target,
            key_builders = key_builders.len(),
            max_send_message_bytes = options.max_send_message_bytes,
            max_recv_message_bytes = options.max_recv_message_bytes,
            app_profile = options.app_profile.as_deref().unwrap_or(""),
            "Data channel configured"
        );

        Ok(Self {
            authority: authority_of(&target).to_string(),
            target,
            options,
            service_config,
            key_builders,
            router,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Host part of the target, sent as the request authority.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.service_config
    }

    pub fn router(&self) -> &SharedRouter {
        &self.router
    }

    /// Choose the target for a request.
    pub fn pick(&self, request: &RequestMetadata) -> Pick {
        let key = self.key_builders.build(request);
        let pick = Pick::from_resolution(self.router.resolve(&key), &self.target);
        metrics::record_route_decision(pick.outcome.label());
        tracing::trace!(key = %key, picked = %pick.target, outcome = pick.outcome.label(), "Route picked");
        pick
    }
}

/// `dns:///host:port` → `host:port`; a bare `host:port` is returned as is.
pub fn authority_of(target: &str) -> &str {
    let rest = match target.split_once("://") {
        Some((_, rest)) => rest.trim_start_matches('/'),
        None => target,
    };
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::rls::STORAGE_SERVICE;
    use crate::routing::{Pattern, RouteKey, Rule, RoutingTable};

    fn channel(table: RoutingTable) -> Channel {
        let service_config = ServiceConfig::for_data_channel(&HarnessConfig::default());
        Channel::new(
            "dns:///data.example.com",
            service_config,
            ChannelOptions::default(),
            SharedRouter::new(table),
        )
        .unwrap()
    }

    #[test]
    fn test_authority() {
        assert_eq!(authority_of("dns:///data.example.com"), "data.example.com");
        assert_eq!(authority_of("dns://8.8.8.8/data.example.com:443"), "8.8.8.8");
        assert_eq!(authority_of("localhost:8086"), "localhost:8086");
    }

    #[test]
    fn test_pick_by_rule() {
        let table = RoutingTable::new(
            vec![Rule::new(Pattern::parse("method=ReadRows").unwrap(), "dns:///reads")],
            None,
        );
        let channel = channel(table);

        let read = RequestMetadata::new("data.example.com", STORAGE_SERVICE, "ReadRows");
        assert_eq!(
            channel.pick(&read),
            Pick {
                target: "dns:///reads".into(),
                outcome: PickOutcome::Rule(0)
            }
        );

        let write = RequestMetadata::new("data.example.com", STORAGE_SERVICE, "MutateRow");
        let pick = channel.pick(&write);
        assert_eq!(pick.outcome, PickOutcome::Fallback);
        assert_eq!(pick.target, "dns:///data.example.com");
    }

    #[test]
    fn test_unrouted_key_picks_fallback() {
        let fallback = "dns:///data.example.com";
        let key = RouteKey::from_pairs([("service", "google.bigtable.v2.Bigtable")]);

        let pick = Pick::from_resolution(RoutingTable::default().resolve(&key), fallback);
        assert_eq!(
            pick,
            Pick {
                target: fallback.into(),
                outcome: PickOutcome::Fallback
            }
        );

        let with_default = RoutingTable::new(Vec::new(), Some("dns:///default".into()));
        let pick = Pick::from_resolution(with_default.resolve(&key), fallback);
        assert_eq!(pick.target, "dns:///default");
        assert_eq!(pick.outcome, PickOutcome::Default);
    }

    #[test]
    fn test_uncovered_service_gets_empty_key() {
        let table = RoutingTable::new(
            vec![
                Rule::new(Pattern::parse("service=*").unwrap(), "dns:///covered"),
                Rule::new(Pattern::wildcard(), "dns:///any"),
            ],
            None,
        );
        let channel = channel(table);

        let other = RequestMetadata::new("h", "other.Service", "Call");
        assert_eq!(channel.pick(&other).target, "dns:///any");
    }

    #[test]
    fn test_rejects_invalid_service_config() {
        let mut config = HarnessConfig::default();
        config.rls.cache_size_bytes = 0;
        let err = Channel::new(
            "dns:///data",
            ServiceConfig::for_data_channel(&config),
            ChannelOptions::default(),
            SharedRouter::new(RoutingTable::default()),
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::ServiceConfig(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_rejects_invalid_target() {
        let err = Channel::new(
            "",
            ServiceConfig::for_data_channel(&HarnessConfig::default()),
            ChannelOptions::default(),
            SharedRouter::new(RoutingTable::default()),
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidTarget(_)));
    }
}
