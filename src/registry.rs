//! Routing of resource identifiers to JSON-LD contexts.
//!
//! Matchers are tried in the order they were added and the first one that
//! matches wins, even when a later matcher would be more specific. Register
//! the narrow patterns before the broad ones.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tracing::trace;

/// Decides whether a context applies to an identifier.
#[derive(Clone, Debug)]
pub enum Matcher {
    /// Matches identifiers that start with the string.
    Prefix(String),

    /// Matches identifiers the pattern finds a match in (unanchored).
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Matcher::Prefix(prefix) => id.starts_with(prefix as &str),
            Matcher::Pattern(regex) => regex.is_match(id),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Matcher::Prefix(prefix) => write!(f, "prefix {}", prefix),
            Matcher::Pattern(regex) => write!(f, "pattern /{}/", regex.as_str()),
        }
    }
}

impl From<&str> for Matcher {
    fn from(prefix: &str) -> Self {
        Matcher::Prefix(prefix.to_owned())
    }
}

impl From<String> for Matcher {
    fn from(prefix: String) -> Self {
        Matcher::Prefix(prefix)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Pattern(regex)
    }
}

/// An ordered list of (matcher, context) pairs.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    entries: RwLock<Vec<(Matcher, Value)>>,
}

impl ContextRegistry {
    pub fn new() -> ContextRegistry {
        ContextRegistry::default()
    }

    /// Appends a routing entry. Identical matchers are allowed; the later
    /// one is only reached when the earlier one does not match.
    pub fn add_context<M: Into<Matcher>>(&self, matcher: M, context: Value) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push((matcher.into(), context));
    }

    /// The context of the first matcher that matches `id`.
    pub fn resolve_context(&self, id: &str) -> Option<Value> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let found = entries.iter().find(|(matcher, _)| matcher.matches(id));
        match found {
            Some((matcher, context)) => {
                trace!(%id, %matcher, "context resolved");
                Some(context.clone())
            }
            None => {
                trace!(%id, "no context registered");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> ContextRegistry {
        let registry = ContextRegistry::new();
        registry.add_context("http://localhost/person/", json!({ "@vocab": "http://schema.org/" }));
        registry.add_context(
            Regex::new(".*localhost/blog.*").unwrap(),
            json!({ "@vocab": "http://schema.org/", "blog": true }),
        );
        registry
    }

    #[test]
    fn prefixes_match_by_prefix() {
        let registry = registry();

        assert_eq!(
            registry.resolve_context("http://localhost/person/john"),
            Some(json!({ "@vocab": "http://schema.org/" }))
        );
        assert_eq!(registry.resolve_context("http://localhost/people/john"), None);
    }

    #[test]
    fn patterns_match_anywhere() {
        let registry = registry();

        assert_eq!(
            registry.resolve_context("http://localhost/blog"),
            Some(json!({ "@vocab": "http://schema.org/", "blog": true }))
        );
        assert!(registry.resolve_context("http://localhost/blog#post").is_some());
    }

    #[test]
    fn first_registered_match_wins() {
        let registry = registry();
        registry.add_context("http://localhost/person/john", json!({ "@vocab": "http://xmlns.com/foaf/0.1/" }));
        registry.add_context(Regex::new("person").unwrap(), json!(null));

        assert_eq!(
            registry.resolve_context("http://localhost/person/john"),
            Some(json!({ "@vocab": "http://schema.org/" }))
        );
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = ContextRegistry::new();

        assert!(registry.is_empty());
        assert_eq!(registry.resolve_context("http://localhost/person/john"), None);
    }
}
