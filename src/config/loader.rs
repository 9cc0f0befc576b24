//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::HarnessConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse TOML text into a configuration without validating it.
///
/// Command-line overrides are applied between parsing and validation, so
/// callers validate explicitly once the final configuration is assembled.
pub fn parse_config(content: &str) -> Result<HarnessConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let config = read_config(path)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = parse_config(
            r#"
            [storage]
            table_id = "greetings"
            app_profile = "batch"

            [run]
            skip_table_deletion = true
            table_creation_wait_secs = 0

            [[routing.rules]]
            pattern = "service=google.bigtable.v2.Bigtable"
            target = "dns:///replica-a"
            "#,
        )
        .unwrap();

        assert_eq!(config.storage.table_id, "greetings");
        assert_eq!(config.storage.column_family, "cf1");
        assert_eq!(config.app_profile(), Some("batch"));
        assert!(config.run.skip_table_deletion);
        assert!(config.run.use_route_lookup);
        assert_eq!(config.routing.rules.len(), 1);
        assert_eq!(config.routing.rules[0].target, "dns:///replica-a");
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[storage\ntable_id = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_rejects_invalid() {
        let path = std::env::temp_dir().join(format!("rls-harness-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[channel]\nmax_send_message_bytes = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        let _ = fs::remove_file(&path);

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {}", other),
        }
    }

    #[test]
    fn test_read_defers_validation() {
        let path = std::env::temp_dir().join(format!("rls-harness-{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "[storage]\ntable_id = \"\"\n").unwrap();

        let read = read_config(&path);
        let loaded = load_config(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(read.unwrap().storage.table_id, "");
        assert!(matches!(loaded, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/rls-harness.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
