//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check required identifiers are present
//! - Validate value ranges (limits > 0) and target URIs
//! - Compile routing rules once to surface pattern errors early
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HarnessConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::HarnessConfig;
use crate::rls::is_valid_target;
use crate::routing::{Pattern, PatternError};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} {value:?} is not a valid target URI")]
    InvalidTarget { field: String, value: String },

    #[error("routing.rules[{index}].pattern: {source}")]
    InvalidPattern { index: usize, source: PatternError },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.log_level {0:?} is not a valid filter directive")]
    InvalidLogLevel(String),
}

fn require(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::EmptyField(field));
    }
}

fn require_target(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if !is_valid_target(value) {
        errors.push(ValidationError::InvalidTarget {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let storage = &config.storage;
    require(&mut errors, "storage.project_id", &storage.project_id);
    require(&mut errors, "storage.instance_id", &storage.instance_id);
    require(&mut errors, "storage.table_id", &storage.table_id);
    require(&mut errors, "storage.column_family", &storage.column_family);
    require(&mut errors, "storage.column_qualifier", &storage.column_qualifier);
    require(&mut errors, "storage.row_key_prefix", &storage.row_key_prefix);

    require_target(&mut errors, "endpoints.admin", &config.endpoints.admin);
    require_target(&mut errors, "endpoints.data", &config.endpoints.data);
    if config.run.use_route_lookup {
        require_target(&mut errors, "endpoints.lookup_service", &config.endpoints.lookup_service);
        if let Some(target) = config.default_target() {
            require_target(&mut errors, "endpoints.default_target", &target);
        }
        if config.rls.lookup_timeout_secs == 0 {
            errors.push(ValidationError::Zero("rls.lookup_timeout_secs"));
        }
        if config.rls.cache_size_bytes <= 0 {
            errors.push(ValidationError::Zero("rls.cache_size_bytes"));
        }
    }

    for (index, rule) in config.routing.rules.iter().enumerate() {
        if let Err(source) = Pattern::parse(&rule.pattern) {
            errors.push(ValidationError::InvalidPattern { index, source });
        }
        require_target(&mut errors, &format!("routing.rules[{}].target", index), &rule.target);
    }

    if config.channel.max_send_message_bytes == 0 {
        errors.push(ValidationError::Zero("channel.max_send_message_bytes"));
    }
    if config.channel.max_recv_message_bytes == 0 {
        errors.push(ValidationError::Zero("channel.max_recv_message_bytes"));
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
