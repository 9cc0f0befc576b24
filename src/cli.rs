//! Command-line interface.
//!
//! Flags override values from `--config`, which override built-in defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{read_config, validate_config, ConfigError, HarnessConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "rls-harness")]
#[command(version, about = "Storage integration run over a route-lookup data channel", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub project_id: Option<String>,

    #[arg(long)]
    pub instance_id: Option<String>,

    #[arg(long)]
    pub table_id: Option<String>,

    #[arg(long)]
    pub column_family: Option<String>,

    #[arg(long)]
    pub column_qualifier: Option<String>,

    /// Rows are written as {prefix}0, {prefix}1, {prefix}2
    #[arg(long)]
    pub row_key_prefix: Option<String>,

    /// Application profile (empty for the service default)
    #[arg(long)]
    pub app_profile: Option<String>,

    /// Put the default target into the route lookup policy
    #[arg(long)]
    pub enable_default_target: bool,

    /// Leave the table in place when the run ends
    #[arg(long)]
    pub skip_table_deletion: bool,

    /// Seconds to wait after creating the table
    #[arg(long)]
    pub table_creation_wait_secs: Option<u64>,

    /// Bypass the routed data channel
    #[arg(long)]
    pub direct: bool,

    /// Reload routing rules when the config file changes
    #[arg(long, requires = "config")]
    pub watch: bool,

    /// Print a Prometheus metrics snapshot when the run ends
    #[arg(long)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the integration stages (the default)
    Run,
    /// Print the data channel's service config as JSON
    ServiceConfig,
    /// Resolve a route key against the configured rules
    Resolve {
        /// Key entry as name=value; repeat in key order
        #[arg(short = 'k', long = "key", value_parser = parse_key_entry)]
        entries: Vec<(String, String)>,
    },
}

fn parse_key_entry(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("{:?} is not of the form name=value", s))?;
    if name.is_empty() {
        return Err(format!("{:?} has an empty name", s));
    }
    Ok((name.to_string(), value.to_string()))
}

impl Cli {
    /// Apply flag overrides on top of `config`.
    pub fn apply(&self, config: &mut HarnessConfig) {
        let storage = &mut config.storage;
        let overrides = [
            (&self.project_id, &mut storage.project_id),
            (&self.instance_id, &mut storage.instance_id),
            (&self.table_id, &mut storage.table_id),
            (&self.column_family, &mut storage.column_family),
            (&self.column_qualifier, &mut storage.column_qualifier),
            (&self.row_key_prefix, &mut storage.row_key_prefix),
        ];
        for (flag, field) in overrides {
            if let Some(value) = flag {
                *field = value.clone();
            }
        }
        if let Some(profile) = &self.app_profile {
            storage.app_profile = Some(profile.clone());
        }

        if self.enable_default_target {
            config.rls.enable_default_target = true;
        }
        if self.skip_table_deletion {
            config.run.skip_table_deletion = true;
        }
        if let Some(secs) = self.table_creation_wait_secs {
            config.run.table_creation_wait_secs = secs;
        }
        if self.direct {
            config.run.use_route_lookup = false;
        }
        if self.print_metrics {
            config.observability.print_metrics = true;
        }
    }

    /// Apply overrides to a freshly parsed `config`, then validate it.
    ///
    /// Used for the initial load and for every reload of the config file.
    pub fn finish(&self, mut config: HarnessConfig) -> Result<HarnessConfig, ConfigError> {
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Load the config file (if any), apply overrides, then validate.
    pub fn load_config(&self) -> Result<HarnessConfig, ConfigError> {
        let config = match &self.config {
            Some(path) => read_config(path)?,
            None => HarnessConfig::default(),
        };
        self.finish(config)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "rls-harness",
            "--table-id",
            "greetings",
            "--app-profile",
            "batch",
            "--skip-table-deletion",
            "--direct",
            "--table-creation-wait-secs",
            "0",
        ])
        .unwrap();
        let config = cli.load_config().unwrap();

        assert_eq!(config.storage.table_id, "greetings");
        assert_eq!(config.storage.project_id, "directpath-prod-manual-testing");
        assert_eq!(config.app_profile(), Some("batch"));
        assert!(config.run.skip_table_deletion);
        assert!(!config.run.use_route_lookup);
        assert_eq!(config.run.table_creation_wait_secs, 0);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_watch_requires_config() {
        assert!(Cli::try_parse_from(["rls-harness", "--watch"]).is_err());
    }

    #[test]
    fn test_resolve_entries() {
        let cli = Cli::try_parse_from(["rls-harness", "resolve", "-k", "service=A", "--key", "method=Read=x"]).unwrap();
        match cli.command {
            Some(Command::Resolve { entries }) => assert_eq!(
                entries,
                vec![
                    ("service".to_string(), "A".to_string()),
                    ("method".to_string(), "Read=x".to_string())
                ]
            ),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["rls-harness", "resolve", "-k", "=A"]).is_err());
    }

    #[test]
    fn test_file_then_flags() {
        let path = std::env::temp_dir().join(format!("rls-harness-cli-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[storage]\ntable_id = \"from-file\"\ncolumn_family = \"cf9\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "rls-harness",
            "--config",
            path.to_str().unwrap(),
            "--table-id",
            "from-flag",
        ])
        .unwrap();
        let config = cli.load_config();
        let _ = fs::remove_file(&path);
        let config = config.unwrap();

        assert_eq!(config.storage.table_id, "from-flag");
        assert_eq!(config.storage.column_family, "cf9");
    }

    #[test]
    fn test_reloaded_file_gets_flag_overrides() {
        let path = std::env::temp_dir().join(format!("rls-harness-cli-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[storage]\ntable_id = \"\"\n").unwrap();

        let cli = Cli::try_parse_from(["rls-harness", "--table-id", "from-flag"]).unwrap();
        let reloaded = read_config(&path);
        let _ = fs::remove_file(&path);
        let reloaded = reloaded.unwrap();

        assert!(validate_config(&reloaded).is_err());
        let config = cli.finish(reloaded).unwrap();
        assert_eq!(config.storage.table_id, "from-flag");
    }

    #[test]
    fn test_finish_validates_after_overrides() {
        let cli = Cli::try_parse_from(["rls-harness", "--column-family", " "]).unwrap();
        let err = cli.finish(HarnessConfig::default()).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, vec![crate::config::ValidationError::EmptyField("storage.column_family")])
            }
            other => panic!("expected validation error, got {}", other),
        }
    }
}
