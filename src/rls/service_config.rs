//! Typed service configuration for the route lookup load-balancing policy.
//!
//! The document is built from [`HarnessConfig`], validated, and only then
//! serialized to JSON for the channel. Field names follow the gRPC service
//! config schema (`camelCase`, policy names as map keys).

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::HarnessConfig;
use crate::rls::{REQUEST_PARAMS_HEADER, RESOURCE_PREFIX_HEADER, STORAGE_SERVICE};

/// Errors found while validating or (de)serializing a service config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceConfigError {
    #[error("loadBalancingConfig has no rls_experimental policy")]
    MissingRlsPolicy,

    #[error("lookupService must not be empty")]
    EmptyLookupService,

    #[error("lookupService {0:?} is not a valid target URI")]
    InvalidLookupService(String),

    #[error("defaultTarget {0:?} is not a valid target URI")]
    InvalidDefaultTarget(String),

    #[error("lookupServiceTimeout must be positive")]
    NonPositiveTimeout,

    #[error("cacheSizeBytes must be positive, got {0}")]
    InvalidCacheSize(i64),

    #[error("at least one grpcKeybuilder is required")]
    NoKeyBuilders,

    #[error("grpcKeybuilder #{0} has no names")]
    EmptyNames(usize),

    #[error("grpcKeybuilder #{0} has a name with an empty service")]
    EmptyServiceName(usize),

    #[error("grpcKeybuilder #{index} header key {key:?} has no header names")]
    EmptyHeaderNames { index: usize, key: String },

    #[error("grpcKeybuilder #{index} uses key {key:?} more than once")]
    DuplicateKey { index: usize, key: String },

    #[error("childPolicy must not be empty")]
    NoChildPolicy,

    #[error("childPolicyConfigTargetFieldName must not be empty")]
    MissingTargetFieldName,

    #[error("invalid service config JSON: {0}")]
    Json(String),
}

/// Root of the service config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub load_balancing_config: Vec<LoadBalancingPolicy>,
}

/// One entry of a policy list; serialized as `{"<policy name>": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadBalancingPolicy {
    #[serde(rename = "rls_experimental")]
    Rls(Box<RlsPolicy>),
    #[serde(rename = "grpclb")]
    Grpclb(GrpclbPolicy),
    #[serde(rename = "pick_first")]
    PickFirst(PickFirstPolicy),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RlsPolicy {
    pub route_lookup_config: RouteLookupConfig,
    /// Service config for the channel to the lookup service itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_lookup_channel_service_config: Option<ServiceConfig>,
    pub child_policy: Vec<LoadBalancingPolicy>,
    pub child_policy_config_target_field_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteLookupConfig {
    pub grpc_keybuilders: Vec<GrpcKeyBuilder>,
    pub lookup_service: String,
    #[serde(with = "crate::rls::duration")]
    pub lookup_service_timeout: Duration,
    #[serde(with = "crate::rls::duration")]
    pub max_age: Duration,
    #[serde(with = "crate::rls::duration")]
    pub stale_age: Duration,
    pub cache_size_bytes: i64,
    /// Absent means "no default target".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpcKeyBuilder {
    pub names: Vec<ServiceMethodName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<HeaderKey>,
    #[serde(default)]
    pub extra_keys: ExtraKeys,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constant_keys: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMethodName {
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderKey {
    pub key: String,
    pub names: Vec<String>,
}

/// Key names under which the authority, service and method are recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrpclbPolicy {
    pub child_policy: Vec<LoadBalancingPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickFirstPolicy {}

/// Returns true for `scheme:///path`-style URIs and plain `host[:port]` targets.
pub fn is_valid_target(target: &str) -> bool {
    if target.is_empty() || target.chars().any(char::is_whitespace) {
        return false;
    }
    if target.contains("://") {
        return url::Url::parse(target).is_ok();
    }
    true
}

fn grpclb_pick_first() -> LoadBalancingPolicy {
    LoadBalancingPolicy::Grpclb(GrpclbPolicy {
        child_policy: vec![LoadBalancingPolicy::PickFirst(PickFirstPolicy::default())],
    })
}

impl GrpcKeyBuilder {
    /// Key builder covering every method of the storage data service.
    pub fn storage_default() -> Self {
        Self {
            names: vec![ServiceMethodName {
                service: STORAGE_SERVICE.to_string(),
                method: None,
            }],
            headers: [REQUEST_PARAMS_HEADER, RESOURCE_PREFIX_HEADER]
                .into_iter()
                .map(|h| HeaderKey {
                    key: h.to_string(),
                    names: vec![h.to_string()],
                })
                .collect(),
            extra_keys: ExtraKeys {
                host: Some("server".to_string()),
                service: Some("service".to_string()),
                method: Some("method".to_string()),
            },
            constant_keys: BTreeMap::new(),
        }
    }
}

impl ServiceConfig {
    /// Build the data channel's service config from the harness configuration.
    pub fn for_data_channel(config: &HarnessConfig) -> Self {
        let ttl = config.decision_ttl();
        let rls = RlsPolicy {
            route_lookup_config: RouteLookupConfig {
                grpc_keybuilders: vec![GrpcKeyBuilder::storage_default()],
                lookup_service: config.endpoints.lookup_service.clone(),
                lookup_service_timeout: Duration::from_secs(config.rls.lookup_timeout_secs),
                max_age: ttl.max_age,
                stale_age: ttl.stale_age,
                cache_size_bytes: config.rls.cache_size_bytes,
                default_target: config.default_target(),
            },
            // The lookup service is only reachable through its own balancer.
            route_lookup_channel_service_config: Some(ServiceConfig {
                load_balancing_config: vec![grpclb_pick_first()],
            }),
            child_policy: vec![grpclb_pick_first()],
            child_policy_config_target_field_name: "serviceName".to_string(),
        };
        Self {
            load_balancing_config: vec![LoadBalancingPolicy::Rls(Box::new(rls))],
        }
    }

    /// The first route lookup policy in the list, if any.
    pub fn rls_policy(&self) -> Option<&RlsPolicy> {
        self.load_balancing_config.iter().find_map(|p| match p {
            LoadBalancingPolicy::Rls(rls) => Some(rls.as_ref()),
            _ => None,
        })
    }

    /// Semantic checks; returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<ServiceConfigError>> {
        let Some(rls) = self.rls_policy() else {
            return Err(vec![ServiceConfigError::MissingRlsPolicy]);
        };
        let mut errors = Vec::new();
        let lookup = &rls.route_lookup_config;

        if lookup.lookup_service.is_empty() {
            errors.push(ServiceConfigError::EmptyLookupService);
        } else if !is_valid_target(&lookup.lookup_service) {
            errors.push(ServiceConfigError::InvalidLookupService(lookup.lookup_service.clone()));
        }
        if let Some(target) = &lookup.default_target {
            if !target.is_empty() && !is_valid_target(target) {
                errors.push(ServiceConfigError::InvalidDefaultTarget(target.clone()));
            }
        }
        if lookup.lookup_service_timeout.is_zero() {
            errors.push(ServiceConfigError::NonPositiveTimeout);
        }
        if lookup.cache_size_bytes <= 0 {
            errors.push(ServiceConfigError::InvalidCacheSize(lookup.cache_size_bytes));
        }

        if lookup.grpc_keybuilders.is_empty() {
            errors.push(ServiceConfigError::NoKeyBuilders);
        }
        for (index, builder) in lookup.grpc_keybuilders.iter().enumerate() {
            if builder.names.is_empty() {
                errors.push(ServiceConfigError::EmptyNames(index));
            }
            if builder.names.iter().any(|n| n.service.is_empty()) {
                errors.push(ServiceConfigError::EmptyServiceName(index));
            }

            let mut keys: Vec<&str> = Vec::new();
            let extra = [&builder.extra_keys.host, &builder.extra_keys.service, &builder.extra_keys.method];
            let all_keys = builder
                .headers
                .iter()
                .map(|h| h.key.as_str())
                .chain(extra.into_iter().flatten().map(String::as_str).filter(|k| !k.is_empty()))
                .chain(builder.constant_keys.keys().map(String::as_str));
            for key in all_keys {
                if keys.contains(&key) {
                    errors.push(ServiceConfigError::DuplicateKey {
                        index,
                        key: key.to_string(),
                    });
                } else {
                    keys.push(key);
                }
            }
            for header in builder.headers.iter().filter(|h| h.names.is_empty()) {
                errors.push(ServiceConfigError::EmptyHeaderNames {
                    index,
                    key: header.key.clone(),
                });
            }
        }

        if rls.child_policy.is_empty() {
            errors.push(ServiceConfigError::NoChildPolicy);
        }
        if rls.child_policy_config_target_field_name.is_empty() {
            errors.push(ServiceConfigError::MissingTargetFieldName);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_json(&self) -> Result<String, ServiceConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ServiceConfigError::Json(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ServiceConfigError> {
        serde_json::from_str(json).map_err(|e| ServiceConfigError::Json(e.to_string()))
    }
}
