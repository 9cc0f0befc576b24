//! Admin and data sessions for a run.
//!
//! # Responsibilities
//! - Open the admin client and the data client (direct or routed)
//! - Build the route table and the data channel from configuration
//! - Apply route table reloads published by the config watcher, once the
//!   reloaded file has been finished (overrides applied, validated)

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, ConfigUpdate, HarnessConfig};
use crate::harness::HarnessError;
use crate::lifecycle::Shutdown;
use crate::rls::ServiceConfig;
use crate::routing::{RoutingTable, RuleError, SharedRouter};
use crate::storage::{AdminClient, DataClient, MemoryStore};
use crate::transport::{Channel, ChannelOptions, RoutedDataClient, TargetPool};

/// Open clients for one run.
#[derive(Clone)]
pub struct Sessions {
    pub admin: Arc<dyn AdminClient>,
    pub data: Arc<dyn DataClient>,
    routing: Option<RoutingState>,
}

#[derive(Clone)]
struct RoutingState {
    router: SharedRouter,
    pool: TargetPool,
    /// Registered for targets that appear after a reload.
    replica: Option<Arc<dyn DataClient>>,
}

impl Sessions {
    /// Sessions that talk to `data` directly, without a routed channel.
    pub fn direct(admin: Arc<dyn AdminClient>, data: Arc<dyn DataClient>) -> Self {
        Self {
            admin,
            data,
            routing: None,
        }
    }

    /// Sessions whose data path goes through the route lookup channel.
    ///
    /// `pool` supplies the backend for each target the channel may pick.
    pub fn routed(
        config: &HarnessConfig,
        admin: Arc<dyn AdminClient>,
        pool: TargetPool,
    ) -> Result<Self, HarnessError> {
        let router = SharedRouter::new(routing_table(config)?);

        let options = ChannelOptions {
            max_send_message_bytes: config.channel.max_send_message_bytes,
            max_recv_message_bytes: config.channel.max_recv_message_bytes,
            app_profile: config.app_profile().map(str::to_string),
        };
        let channel = Channel::new(
            config.endpoints.data.as_str(),
            ServiceConfig::for_data_channel(config),
            options,
            router.clone(),
        )?;

        let data = RoutedDataClient::new(Arc::new(channel), pool.clone(), config.resource_prefix());
        Ok(Self {
            admin,
            data: Arc::new(data),
            routing: Some(RoutingState {
                router,
                pool,
                replica: None,
            }),
        })
    }

    /// Sessions backed by one in-process store.
    ///
    /// Every target the route table can produce, and the data endpoint
    /// itself, is served by `store`.
    pub fn connect_emulated(config: &HarnessConfig, store: MemoryStore) -> Result<Self, HarnessError> {
        let admin: Arc<dyn AdminClient> = Arc::new(store.clone());
        let data: Arc<dyn DataClient> = Arc::new(store);

        if !config.run.use_route_lookup {
            tracing::info!("Route lookup disabled, using direct data session");
            return Ok(Self::direct(admin, data));
        }

        let pool = TargetPool::new().with_backend(config.endpoints.data.as_str(), data.clone());
        for target in routing_table(config)?.targets() {
            pool.insert(target, data.clone());
        }

        let mut sessions = Self::routed(config, admin, pool)?;
        if let Some(routing) = sessions.routing.as_mut() {
            routing.replica = Some(data);
        }
        Ok(sessions)
    }

    /// The shared route table, when the data path is routed.
    pub fn router(&self) -> Option<&SharedRouter> {
        self.routing.as_ref().map(|r| &r.router)
    }

    /// Replace the route table with the one described by `config`.
    ///
    /// Returns `Ok(false)` when the data path is not routed.
    pub fn apply_routes(&self, config: &HarnessConfig) -> Result<bool, RuleError> {
        let Some(routing) = &self.routing else {
            return Ok(false);
        };
        let table = routing_table(config)?;
        if let Some(replica) = &routing.replica {
            for target in table.targets() {
                if !routing.pool.contains(target) {
                    routing.pool.insert(target, replica.clone());
                }
            }
        }
        routing.router.replace(table);
        Ok(true)
    }

    /// Finish one watcher update with `finish` and apply its routing rules.
    ///
    /// Nothing is applied unless the finished configuration is valid.
    pub fn reload<F>(&self, update: ConfigUpdate, finish: F) -> Result<bool, HarnessError>
    where
        F: FnOnce(HarnessConfig) -> Result<HarnessConfig, ConfigError>,
    {
        let config = finish(update?)?;
        Ok(self.apply_routes(&config)?)
    }

    /// Apply route tables from `updates` until shutdown or the sender is dropped.
    ///
    /// Each update is passed through `finish` before its rules are applied.
    pub fn spawn_route_reload<F>(
        &self,
        mut updates: mpsc::UnboundedReceiver<ConfigUpdate>,
        finish: F,
        shutdown: Shutdown,
    ) -> JoinHandle<()>
    where
        F: Fn(HarnessConfig) -> Result<HarnessConfig, ConfigError> + Send + 'static,
    {
        let sessions = self.clone();
        tokio::spawn(async move {
            let stopped = shutdown.wait();
            tokio::pin!(stopped);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    update = updates.recv() => match update {
                        Some(update) => match sessions.reload(update, &finish) {
                            Ok(true) => tracing::info!("Routing rules reloaded"),
                            Ok(false) => tracing::debug!("Ignoring route reload for direct session"),
                            Err(e) => tracing::error!(error = %e, "Rejected config reload, keeping current table"),
                        },
                        None => break,
                    },
                }
            }
            tracing::debug!("Route reload task stopped");
        })
    }
}

impl std::fmt::Debug for Sessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sessions")
            .field("routed", &self.routing.is_some())
            .finish()
    }
}

/// Build the route table for `config`.
pub fn routing_table(config: &HarnessConfig) -> Result<RoutingTable, RuleError> {
    Ok(RoutingTable::from_config(&config.routing.rules, config.default_target())?.with_ttl(config.decision_ttl()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::*;
    use crate::cli::Cli;
    use crate::config::{validate_config, RuleConfig};
    use crate::routing::RouteKey;

    fn rule(pattern: &str, target: &str) -> RuleConfig {
        RuleConfig {
            pattern: pattern.into(),
            target: target.into(),
        }
    }

    #[test]
    fn test_direct_when_route_lookup_disabled() {
        let mut config = HarnessConfig::default();
        config.run.use_route_lookup = false;
        let sessions = Sessions::connect_emulated(&config, MemoryStore::new()).unwrap();
        assert!(sessions.router().is_none());
        assert_eq!(sessions.apply_routes(&config), Ok(false));
    }

    #[test]
    fn test_routing_table_ttl_is_clamped() {
        let mut config = HarnessConfig::default();
        config.rls.max_age_secs = 900;
        config.rls.stale_age_secs = 600;
        let ttl = routing_table(&config).unwrap().ttl();
        assert_eq!(ttl.max_age, Duration::from_secs(300));
        assert_eq!(ttl.stale_age, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_rules_fail_connect() {
        let mut config = HarnessConfig::default();
        config.routing.rules.push(rule("", "dns:///t1"));
        let err = Sessions::connect_emulated(&config, MemoryStore::new()).unwrap_err();
        assert!(matches!(err, HarnessError::Routing(_)));
    }

    #[tokio::test]
    async fn test_reload_swaps_table() {
        let config = HarnessConfig::default();
        let sessions = Sessions::connect_emulated(&config, MemoryStore::new()).unwrap();
        let router = sessions.router().cloned().unwrap();
        assert!(router.resolve(&RouteKey::new()).is_err());

        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        let task = sessions.spawn_route_reload(rx, Ok, shutdown.clone());

        let mut updated = config.clone();
        updated.routing.rules.push(rule("*", "dns:///replica"));
        tx.send(Ok(updated)).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(router.resolve(&RouteKey::new()).unwrap().target, "dns:///replica");
    }

    #[tokio::test]
    async fn test_reload_applies_overrides_before_validation() {
        let config = HarnessConfig::default();
        let sessions = Sessions::connect_emulated(&config, MemoryStore::new()).unwrap();
        let router = sessions.router().cloned().unwrap();

        // As parsed from disk: the table id only comes from the command line.
        let mut parsed = config.clone();
        parsed.storage.table_id = String::new();
        parsed.routing.rules.push(rule("*", "dns:///replica"));

        let validate_only = |c: HarnessConfig| validate_config(&c).map(|_| c).map_err(ConfigError::Validation);
        let err = sessions.reload(Ok(parsed.clone()), validate_only).unwrap_err();
        assert!(matches!(err, HarnessError::Config(ConfigError::Validation(_))));
        assert!(router.resolve(&RouteKey::new()).is_err());

        let cli = Cli::try_parse_from(["rls-harness", "--table-id", "from-flag"]).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = sessions.spawn_route_reload(rx, move |c| cli.finish(c), Shutdown::new());
        tx.send(Ok(parsed)).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(router.resolve(&RouteKey::new()).unwrap().target, "dns:///replica");
    }

    #[tokio::test]
    async fn test_reload_keeps_table_on_invalid_update() {
        let mut config = HarnessConfig::default();
        config.routing.rules.push(rule("*", "dns:///first"));
        let sessions = Sessions::connect_emulated(&config, MemoryStore::new()).unwrap();
        let router = sessions.router().cloned().unwrap();

        let mut overridden = config.clone();
        overridden.routing.rules = vec![rule("*", "dns:///second")];
        overridden.channel.max_send_message_bytes = 0;

        let (tx, rx) = mpsc::unbounded_channel();
        let cli = Cli::try_parse_from(["rls-harness"]).unwrap();
        let task = sessions.spawn_route_reload(rx, move |c| cli.finish(c), Shutdown::new());
        tx.send(Err(ConfigError::Validation(Vec::new()))).unwrap();
        tx.send(Ok(overridden)).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(router.resolve(&RouteKey::new()).unwrap().target, "dns:///first");
    }
}
