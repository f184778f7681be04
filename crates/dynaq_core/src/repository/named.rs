//! Named-query registry.
//!
//! # Responsibility
//! - Map method identity keys to statically declared SQL strings.
//! - Support loading declarations from serde-deserialized definitions.
//!
//! # Invariants
//! - Keys are `<repository>.<method>` shaped and registered at most once.
//! - Lookup order is deterministic (`BTreeMap`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One declared query, as loadable from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedQueryDefinition {
    /// Identity key, e.g. `UserRepository.find_adults`.
    pub key: String,
    /// Declared SQL with `:name` bind parameters.
    pub sql: String,
}

/// Registry of statically declared queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedQueries {
    entries: BTreeMap<String, String>,
}

impl NamedQueries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from loaded definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = NamedQueryDefinition>,
    ) -> Result<Self, NamedQueryError> {
        let mut queries = Self::new();
        for definition in definitions {
            queries.register(definition.key, definition.sql)?;
        }
        Ok(queries)
    }

    /// Registers one declared query under its identity key.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        sql: impl Into<String>,
    ) -> Result<(), NamedQueryError> {
        let key = key.into();
        let trimmed_key = key.trim();
        if trimmed_key.is_empty() {
            return Err(NamedQueryError::EmptyKey);
        }
        if !is_identity_key(trimmed_key) {
            return Err(NamedQueryError::InvalidKey(key));
        }

        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(NamedQueryError::EmptySql(trimmed_key.to_string()));
        }
        if self.entries.contains_key(trimmed_key) {
            return Err(NamedQueryError::DuplicateKey(trimmed_key.to_string()));
        }

        self.entries.insert(trimmed_key.to_string(), sql);
        Ok(())
    }

    /// Returns the declared SQL for `key`, if registered.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_identity_key(value: &str) -> bool {
    let mut parts = value.split('.');
    let (Some(repository), Some(method), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    is_identifier(repository) && is_identifier(method)
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Named-query registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedQueryError {
    EmptyKey,
    InvalidKey(String),
    EmptySql(String),
    DuplicateKey(String),
}

impl Display for NamedQueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "named query key must not be empty"),
            Self::InvalidKey(key) => {
                write!(f, "named query key must be `<repository>.<method>`: `{key}`")
            }
            Self::EmptySql(key) => write!(f, "named query `{key}` has empty SQL"),
            Self::DuplicateKey(key) => write!(f, "named query key already registered: {key}"),
        }
    }
}

impl Error for NamedQueryError {}

#[cfg(test)]
mod tests {
    use super::{NamedQueries, NamedQueryDefinition, NamedQueryError};

    #[test]
    fn registers_and_looks_up_by_identity_key() {
        let mut queries = NamedQueries::new();
        queries
            .register("UserRepository.find_adults", "SELECT * FROM users WHERE age >= 18")
            .expect("registration");

        assert_eq!(queries.len(), 1);
        assert_eq!(
            queries.lookup("UserRepository.find_adults"),
            Some("SELECT * FROM users WHERE age >= 18")
        );
        assert_eq!(queries.lookup("UserRepository.missing"), None);
    }

    #[test]
    fn rejects_duplicate_and_malformed_keys() {
        let mut queries = NamedQueries::new();
        queries
            .register("R.m", "SELECT 1")
            .expect("first registration");

        assert_eq!(
            queries.register("R.m", "SELECT 2"),
            Err(NamedQueryError::DuplicateKey("R.m".to_string()))
        );
        assert_eq!(
            queries.register("no_dot_here", "SELECT 1"),
            Err(NamedQueryError::InvalidKey("no_dot_here".to_string()))
        );
        assert_eq!(
            queries.register("a.b.c", "SELECT 1"),
            Err(NamedQueryError::InvalidKey("a.b.c".to_string()))
        );
        assert_eq!(
            queries.register("R.empty", "   "),
            Err(NamedQueryError::EmptySql("R.empty".to_string()))
        );
    }

    #[test]
    fn loads_definitions_from_json() {
        let definitions: Vec<NamedQueryDefinition> = serde_json::from_str(
            r#"[
                {"key": "UserRepository.find_adults", "sql": "SELECT * FROM users WHERE age >= :min_age"},
                {"key": "UserRepository.count_all", "sql": "SELECT COUNT(*) FROM users"}
            ]"#,
        )
        .expect("definitions json");

        let queries = NamedQueries::from_definitions(definitions).expect("registry");
        assert_eq!(queries.len(), 2);
        assert!(queries.lookup("UserRepository.count_all").is_some());
    }
}
