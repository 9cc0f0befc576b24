//! rls-harness
//!
//! Runs the table lifecycle against the in-process storage emulator, with
//! data RPCs routed through the route lookup channel.
//!
//! # Architecture Overview
//!
//! ```text
//!   cli + config file ──▶ HarnessConfig
//!                              │
//!          ┌───────────────────┼──────────────────────┐
//!          ▼                   ▼                      ▼
//!    AdminClient        ServiceConfig + rules    ConfigWatcher (--watch)
//!          │                   │                      │
//!          │                   ▼                      │
//!          │          Channel ─▶ SharedRouter ◀───────┘
//!          │                   │
//!          │                   ▼
//!          │          RoutedDataClient ─▶ TargetPool ─▶ DataClient
//!          ▼                   ▼
//!       Harness: ensure table → write → read row → scan → teardown
//! ```

use std::process::ExitCode;

use clap::Parser;

use rls_harness::cli::{Cli, Command};
use rls_harness::config::{ConfigWatcher, HarnessConfig};
use rls_harness::harness::{session::routing_table, Harness, Sessions};
use rls_harness::lifecycle::{signals, Shutdown};
use rls_harness::observability::{init_logging, metrics};
use rls_harness::rls::ServiceConfig;
use rls_harness::routing::RouteKey;
use rls_harness::storage::MemoryStore;
use rls_harness::transport::{Pick, PickOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.observability.log_level);

    match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => run(cli, config).await,
        Command::ServiceConfig => print_service_config(&config),
        Command::Resolve { entries } => resolve(&config, entries),
    }
}

async fn run(cli: Cli, config: HarnessConfig) -> ExitCode {
    tracing::info!("rls-harness v{} starting", env!("CARGO_PKG_VERSION"));

    let prometheus = if config.observability.print_metrics {
        match metrics::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Metrics recorder unavailable");
                None
            }
        }
    } else {
        None
    };

    let sessions = match Sessions::connect_emulated(&config, MemoryStore::new()) {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open sessions");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    tokio::spawn(signals::ctrl_c(shutdown.clone()));

    // The watcher is held for the duration of the run; dropping it stops the watch.
    let (_watcher, reload_task) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(handle) => {
                    // Reloaded files get the same flag overrides and validation as the initial load.
                    let overrides = cli.clone();
                    let task = sessions.spawn_route_reload(updates, move |c| overrides.finish(c), shutdown.clone());
                    (Some(handle), Some(task))
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher failed to start, routing rules are fixed");
                    (None, None)
                }
            }
        }
        _ => (None, None),
    };

    let harness = Harness::new(config, sessions);
    let outcome = tokio::select! {
        result = harness.run() => Some(result),
        _ = shutdown.wait() => None,
    };
    shutdown.trigger();
    if let Some(task) = reload_task {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Route reload task failed");
        }
    }

    if let Some(handle) = prometheus {
        println!("{}", handle.render());
    }

    match outcome {
        Some(Ok(report)) => {
            tracing::info!(
                table = %report.table,
                rows_written = report.rows_written.len(),
                rows_scanned = report.scanned_rows.len(),
                table_deleted = report.table_deleted,
                "Finished"
            );
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            tracing::error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
        None => {
            tracing::warn!("Run cancelled");
            ExitCode::from(130)
        }
    }
}

fn print_service_config(config: &HarnessConfig) -> ExitCode {
    let service_config = ServiceConfig::for_data_channel(config);
    if let Err(errors) = service_config.validate() {
        for e in errors {
            tracing::error!(error = %e, "Invalid service config");
        }
        return ExitCode::FAILURE;
    }
    match service_config.to_json() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render service config");
            ExitCode::FAILURE
        }
    }
}

fn resolve(config: &HarnessConfig, entries: Vec<(String, String)>) -> ExitCode {
    let table = match routing_table(config) {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(error = %e, "Invalid routing rules");
            return ExitCode::FAILURE;
        }
    };
    let key = RouteKey::from_pairs(entries);
    let pick = Pick::from_resolution(table.resolve(&key), &config.endpoints.data);
    match pick.outcome {
        PickOutcome::Rule(index) => println!("{} (rule #{})", pick.target, index),
        outcome => println!("{} ({})", pick.target, outcome.label()),
    }
    ExitCode::SUCCESS
}
