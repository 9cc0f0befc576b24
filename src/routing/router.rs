//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled rules in insertion order
//! - Resolve a route key to a target (first match, then default)
//! - Return an explicit `NoRouteError` when neither applies
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan over rules (acceptable for typical rule counts)
//! - First match wins, never best match
//! - An empty default target is the same as no default target

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::RuleConfig;
use crate::routing::matcher::{Matcher, Pattern, PatternError};
use crate::routing::RouteKey;

/// Upper bound on how long a decision may be served.
pub const MAX_DECISION_AGE: Duration = Duration::from_secs(300);

/// No rule matched and no default target is configured.
///
/// Callers fall back to a statically configured target; this is not retryable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no route for key {key}")]
pub struct NoRouteError {
    pub key: String,
}

/// A rule could not be compiled.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule #{index} has an invalid pattern: {source}")]
    Pattern { index: usize, source: PatternError },

    #[error("rule #{index} has an empty target")]
    EmptyTarget { index: usize },
}

/// A pattern and the target it routes to.
#[derive(Debug)]
pub struct Rule {
    pub pattern: Pattern,
    pub target: String,
}

impl Rule {
    pub fn new(pattern: Pattern, target: impl Into<String>) -> Self {
        Self {
            pattern,
            target: target.into(),
        }
    }
}

/// How long a decision may be used before it must be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionTtl {
    pub max_age: Duration,
    pub stale_age: Duration,
}

impl DecisionTtl {
    /// Clamp `max_age` to [`MAX_DECISION_AGE`] and `stale_age` to `max_age`.
    pub fn new(max_age: Duration, stale_age: Duration) -> Self {
        let max_age = max_age.min(MAX_DECISION_AGE);
        Self {
            max_age,
            stale_age: stale_age.min(max_age),
        }
    }
}

impl Default for DecisionTtl {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(240))
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// Index of the matching rule.
    Rule(usize),
    Default,
}

/// A resolved target with its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub target: String,
    pub source: DecisionSource,
    pub ttl: DecisionTtl,
    pub resolved_at: Instant,
}

impl Decision {
    /// Past `stale_age`: still usable, but a refresh is due.
    pub fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.resolved_at) >= self.ttl.stale_age
    }

    /// Past `max_age`: must not be used.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.resolved_at) >= self.ttl.max_age
    }
}

/// Ordered rules plus an optional default target.
#[derive(Debug, Default)]
pub struct RoutingTable {
    rules: Vec<Rule>,
    default_target: Option<String>,
    ttl: DecisionTtl,
}

impl RoutingTable {
    pub fn new(rules: Vec<Rule>, default_target: Option<String>) -> Self {
        Self {
            rules,
            default_target: default_target.filter(|t| !t.is_empty()),
            ttl: DecisionTtl::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: DecisionTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Compile rules from configuration, keeping their order.
    pub fn from_config(rules: &[RuleConfig], default_target: Option<String>) -> Result<Self, RuleError> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let pattern =
                    Pattern::parse(&rule.pattern).map_err(|source| RuleError::Pattern { index, source })?;
                if rule.target.trim().is_empty() {
                    return Err(RuleError::EmptyTarget { index });
                }
                Ok(Rule::new(pattern, rule.target.trim()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(compiled, default_target))
    }

    /// Resolve a key: first matching rule, else the default target, else `NoRouteError`.
    pub fn resolve(&self, key: &RouteKey) -> Result<Decision, NoRouteError> {
        let found = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.pattern.matches(key))
            .map(|(index, rule)| (rule.target.clone(), DecisionSource::Rule(index)))
            .or_else(|| self.default_target.clone().map(|t| (t, DecisionSource::Default)));

        match found {
            Some((target, source)) => Ok(Decision {
                target,
                source,
                ttl: self.ttl,
                resolved_at: Instant::now(),
            }),
            None => Err(NoRouteError { key: key.to_string() }),
        }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default_target.as_deref()
    }

    pub fn ttl(&self) -> DecisionTtl {
        self.ttl
    }

    /// Every target this table can produce, rules first, without duplicates.
    pub fn targets(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for target in self
            .rules
            .iter()
            .map(|r| r.target.as_str())
            .chain(self.default_target.as_deref())
        {
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }
}
