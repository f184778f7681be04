//! Derived-query construction from method names.
//!
//! # Responsibility
//! - Turn `find_all` / `find_by_…` / `count_by_…` / `exists_by_…` method
//!   names into equality-filtered SQL over the repository's table.
//!
//! # Invariants
//! - Field lists split on `_and_`; each field must be identifier-shaped.
//! - The derived binding list must match the method's declared parameters
//!   one-to-one, in order.

use crate::repository::metadata::{QueryMethod, RepositoryMetadata, ResultShape};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static SUBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(find|count|exists)_(all|by_(.+))$").expect("subject regex"));
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("field regex"));

/// A query derived purely from a method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedQuery {
    /// Positional SQL over the metadata table.
    pub sql: String,
    /// Method parameter name behind each `?`, in placeholder order.
    pub bindings: Vec<String>,
    /// Shape implied by the method-name verb.
    pub shape: ResultShape,
}

/// Derivation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeriveError {
    Unparseable { name: String },
    InvalidField { name: String, field: String },
    ParameterMismatch { derived: Vec<String>, declared: Vec<String> },
}

impl Display for DeriveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unparseable { name } => write!(
                f,
                "method name `{name}` matches no derivable pattern (find_all, find_by_…, count_by_…, exists_by_…)"
            ),
            Self::InvalidField { name, field } => {
                write!(f, "method `{name}` derives invalid field name `{field}`")
            }
            Self::ParameterMismatch { derived, declared } => write!(
                f,
                "derived fields {derived:?} do not match declared parameters {declared:?}"
            ),
        }
    }
}

impl Error for DeriveError {}

/// Derives a query from `method`'s name over `metadata`'s table.
pub fn derive_query(
    method: &QueryMethod,
    metadata: &RepositoryMetadata,
) -> Result<DerivedQuery, DeriveError> {
    let name = method.name();
    let captures = SUBJECT_RE.captures(name).ok_or_else(|| DeriveError::Unparseable {
        name: name.to_string(),
    })?;
    let verb = &captures[1];
    let fields = match captures.get(3) {
        None => Vec::new(),
        Some(list) => split_fields(name, list.as_str())?,
    };

    if fields != method.parameters() {
        return Err(DeriveError::ParameterMismatch {
            derived: fields,
            declared: method.parameters().to_vec(),
        });
    }

    let table = metadata.table();
    let predicate = build_predicate(&fields);
    let (sql, shape) = match verb {
        "count" => (
            format!("SELECT COUNT(*) FROM {table}{predicate}"),
            ResultShape::Count,
        ),
        "exists" => (
            format!("SELECT EXISTS(SELECT 1 FROM {table}{predicate})"),
            ResultShape::Exists,
        ),
        // "find": honor a declared One shape, default to Many.
        _ => {
            let shape = match method.result_shape() {
                ResultShape::One => ResultShape::One,
                _ => ResultShape::Many,
            };
            (format!("SELECT * FROM {table}{predicate}"), shape)
        }
    };

    Ok(DerivedQuery {
        sql,
        bindings: fields,
        shape,
    })
}

fn split_fields(method_name: &str, list: &str) -> Result<Vec<String>, DeriveError> {
    let mut fields = Vec::new();
    for field in list.split("_and_") {
        if !FIELD_RE.is_match(field) {
            return Err(DeriveError::InvalidField {
                name: method_name.to_string(),
                field: field.to_string(),
            });
        }
        fields.push(field.to_string());
    }
    Ok(fields)
}

fn build_predicate(fields: &[String]) -> String {
    if fields.is_empty() {
        return String::new();
    }
    let clauses: Vec<String> = fields.iter().map(|field| format!("{field} = ?")).collect();
    format!(" WHERE {}", clauses.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::{derive_query, DeriveError};
    use crate::repository::metadata::{QueryMethod, RepositoryMetadata, ResultShape};

    fn users_metadata() -> RepositoryMetadata {
        RepositoryMetadata::new("UserRepository", "User", "users")
    }

    #[test]
    fn derives_find_all() {
        let method = QueryMethod::new("UserRepository", "find_all");
        let derived = derive_query(&method, &users_metadata()).expect("derive");
        assert_eq!(derived.sql, "SELECT * FROM users");
        assert!(derived.bindings.is_empty());
        assert_eq!(derived.shape, ResultShape::Many);
    }

    #[test]
    fn derives_find_by_with_conjunction() {
        let method = QueryMethod::new("UserRepository", "find_by_city_and_age")
            .with_parameters(["city", "age"]);
        let derived = derive_query(&method, &users_metadata()).expect("derive");
        assert_eq!(derived.sql, "SELECT * FROM users WHERE city = ? AND age = ?");
        assert_eq!(derived.bindings, vec!["city", "age"]);
    }

    #[test]
    fn multi_word_fields_survive_and_splitting() {
        let method = QueryMethod::new("UserRepository", "find_by_first_name")
            .with_parameters(["first_name"]);
        let derived = derive_query(&method, &users_metadata()).expect("derive");
        assert_eq!(derived.sql, "SELECT * FROM users WHERE first_name = ?");
    }

    #[test]
    fn derives_count_and_exists_shapes() {
        let count = derive_query(
            &QueryMethod::new("UserRepository", "count_by_city").with_parameters(["city"]),
            &users_metadata(),
        )
        .expect("count");
        assert_eq!(count.sql, "SELECT COUNT(*) FROM users WHERE city = ?");
        assert_eq!(count.shape, ResultShape::Count);

        let exists = derive_query(
            &QueryMethod::new("UserRepository", "exists_by_id").with_parameters(["id"]),
            &users_metadata(),
        )
        .expect("exists");
        assert_eq!(
            exists.sql,
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)"
        );
        assert_eq!(exists.shape, ResultShape::Exists);
    }

    #[test]
    fn honors_declared_one_shape_for_find() {
        let method = QueryMethod::new("UserRepository", "find_by_id")
            .with_parameters(["id"])
            .with_result_shape(ResultShape::One);
        let derived = derive_query(&method, &users_metadata()).expect("derive");
        assert_eq!(derived.shape, ResultShape::One);
    }

    #[test]
    fn rejects_underivable_names() {
        let err = derive_query(
            &QueryMethod::new("UserRepository", "synchronize_cache"),
            &users_metadata(),
        )
        .expect_err("underivable");
        assert!(matches!(err, DeriveError::Unparseable { .. }));
    }

    #[test]
    fn rejects_parameter_mismatch() {
        let method = QueryMethod::new("UserRepository", "find_by_city").with_parameters(["town"]);
        let err = derive_query(&method, &users_metadata()).expect_err("mismatch");
        assert!(matches!(err, DeriveError::ParameterMismatch { .. }));
    }
}
