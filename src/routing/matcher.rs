//! Route key matching logic.
//!
//! # Responsibilities
//! - Parse rule patterns (`*`, `name=value`, `name=*`, comma-joined terms)
//! - Match a route key against a compiled pattern
//! - Combine term conditions with AND semantics
//!
//! # Design Decisions
//! - Names and values are compared exactly (case-sensitive)
//! - A term pattern matches any key that contains all of its terms
//! - No regex to guarantee O(n) matching

use std::fmt;

use thiserror::Error;

use crate::routing::RouteKey;

/// Trait for matching route keys against conditions.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Returns true if the key satisfies this condition.
    fn matches(&self, key: &RouteKey) -> bool;
}

/// Matches every key, including the empty one.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyMatcher;

impl Matcher for AnyMatcher {
    fn matches(&self, _key: &RouteKey) -> bool {
        true
    }
}

/// Matches a single key entry.
#[derive(Debug, Clone)]
pub struct EntryMatcher {
    name: String,
    /// `None` accepts any value as long as the entry is present.
    value: Option<String>,
}

impl EntryMatcher {
    pub fn exact(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn present(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

impl Matcher for EntryMatcher {
    fn matches(&self, key: &RouteKey) -> bool {
        match (key.get(&self.name), &self.value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, key: &RouteKey) -> bool {
        self.matchers.iter().all(|m| m.matches(key))
    }
}

/// Errors raised while parsing a rule pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern is empty")]
    Empty,

    #[error("term {0:?} is not of the form name=value")]
    MalformedTerm(String),

    #[error("term {0:?} has an empty name")]
    EmptyName(String),

    #[error("name {0:?} appears more than once")]
    DuplicateName(String),
}

/// A compiled rule pattern.
#[derive(Debug)]
pub struct Pattern {
    source: String,
    wildcard: bool,
    matcher: Box<dyn Matcher>,
}

impl Pattern {
    /// The bare wildcard, matching every key.
    pub fn wildcard() -> Self {
        Self {
            source: "*".to_string(),
            wildcard: true,
            matcher: Box::new(AnyMatcher),
        }
    }

    /// Parse `*` or `name=value[,name=value...]`. `name=*` requires presence only.
    pub fn parse(source: &str) -> Result<Self, PatternError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(PatternError::Empty);
        }
        if trimmed == "*" {
            return Ok(Self::wildcard());
        }

        let mut seen: Vec<&str> = Vec::new();
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        for term in trimmed.split(',').map(str::trim) {
            let (name, value) = term
                .split_once('=')
                .ok_or_else(|| PatternError::MalformedTerm(term.to_string()))?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() {
                return Err(PatternError::EmptyName(term.to_string()));
            }
            if seen.contains(&name) {
                return Err(PatternError::DuplicateName(name.to_string()));
            }
            seen.push(name);
            matchers.push(if value == "*" {
                Box::new(EntryMatcher::present(name))
            } else {
                Box::new(EntryMatcher::exact(name, value))
            });
        }

        Ok(Self {
            source: trimmed.to_string(),
            wildcard: false,
            matcher: Box::new(AndMatcher::new(matchers)),
        })
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Matcher for Pattern {
    fn matches(&self, key: &RouteKey) -> bool {
        self.matcher.matches(key)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_matcher() {
        let key = RouteKey::new().with("service", "A").with("method", "Read");

        assert!(EntryMatcher::exact("service", "A").matches(&key));
        assert!(!EntryMatcher::exact("service", "a").matches(&key)); // Case sensitive
        assert!(EntryMatcher::present("method").matches(&key));
        assert!(!EntryMatcher::present("host").matches(&key));
    }

    #[test]
    fn test_and_pattern() {
        let pattern = Pattern::parse("service=A, method=*").unwrap();
        assert!(!pattern.is_wildcard());
        assert_eq!(pattern.as_str(), "service=A, method=*");

        assert!(pattern.matches(&RouteKey::new().with("service", "A").with("method", "Write")));
        assert!(!pattern.matches(&RouteKey::new().with("service", "A")));
        assert!(!pattern.matches(&RouteKey::new().with("service", "B").with("method", "Write")));
    }

    #[test]
    fn test_wildcard_matches_empty_key() {
        let pattern = Pattern::parse(" * ").unwrap();
        assert!(pattern.is_wildcard());
        assert!(pattern.matches(&RouteKey::new()));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let pattern = Pattern::parse("x-goog-request-params=table_name=t").unwrap();
        assert!(pattern.matches(&RouteKey::new().with("x-goog-request-params", "table_name=t")));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Pattern::parse("").unwrap_err(), PatternError::Empty);
        assert_eq!(
            Pattern::parse("service").unwrap_err(),
            PatternError::MalformedTerm("service".into())
        );
        assert_eq!(Pattern::parse("=A").unwrap_err(), PatternError::EmptyName("=A".into()));
        assert_eq!(
            Pattern::parse("a=1,a=2").unwrap_err(),
            PatternError::DuplicateName("a".into())
        );
    }
}
