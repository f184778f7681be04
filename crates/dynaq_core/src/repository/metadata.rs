//! Repository and query-method descriptors.
//!
//! # Responsibility
//! - Identify a repository (entity, backing table) and each of its
//!   data-access methods.
//! - Carry the dynamic-query marker: an optional template source attached to
//!   the method at wiring time.
//!
//! # Invariants
//! - All names are identifier-shaped; `validate()` rejects anything else.
//! - `identity_key()` is stable: `<repository>.<method>`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Expected result shape of a repository method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// Zero or more projection records.
    Many,
    /// At most one record; more than one is an execution error.
    One,
    /// A single integer count.
    Count,
    /// A boolean existence check.
    Exists,
}

impl Default for ResultShape {
    fn default() -> Self {
        Self::Many
    }
}

/// Metadata describing one repository interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    repository: String,
    entity: String,
    table: String,
}

impl RepositoryMetadata {
    /// Creates repository metadata. Call [`RepositoryMetadata::validate`]
    /// before handing it to query resolution.
    pub fn new(
        repository: impl Into<String>,
        entity: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            entity: entity.into(),
            table: table.into(),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Validates declaration-level naming invariants.
    pub fn validate(&self) -> Result<(), MetadataError> {
        require_identifier("repository", &self.repository)?;
        require_identifier("entity", &self.entity)?;
        require_identifier("table", &self.table)?;
        Ok(())
    }
}

/// Descriptor for one data-access method on a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryMethod {
    repository: String,
    name: String,
    parameters: Vec<String>,
    result_shape: ResultShape,
    dynamic_source: Option<String>,
}

impl QueryMethod {
    /// Creates a descriptor with no parameters and a `Many` result shape.
    pub fn new(repository: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
            parameters: Vec::new(),
            result_shape: ResultShape::Many,
            dynamic_source: None,
        }
    }

    /// Sets the ordered parameter names.
    pub fn with_parameters(
        mut self,
        parameters: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the expected result shape.
    pub fn with_result_shape(mut self, shape: ResultShape) -> Self {
        self.result_shape = shape;
        self
    }

    /// Attaches the dynamic-query marker with its template source.
    pub fn with_dynamic_query(mut self, source: impl Into<String>) -> Self {
        self.dynamic_source = Some(source.into());
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn result_shape(&self) -> ResultShape {
        self.result_shape
    }

    /// Dynamic template source when the method carries the marker.
    pub fn dynamic_query(&self) -> Option<&str> {
        self.dynamic_source.as_deref()
    }

    /// Stable identity key used by named-query and log lookups.
    pub fn identity_key(&self) -> String {
        format!("{}.{}", self.repository, self.name)
    }

    /// Validates declaration-level naming invariants.
    pub fn validate(&self) -> Result<(), MetadataError> {
        require_identifier("repository", &self.repository)?;
        require_identifier("method", &self.name)?;

        let mut seen = BTreeSet::<&str>::new();
        for parameter in &self.parameters {
            require_identifier("parameter", parameter)?;
            if !seen.insert(parameter.as_str()) {
                return Err(MetadataError::DuplicateParameter(parameter.clone()));
            }
        }
        Ok(())
    }
}

/// Declaration-level metadata errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    EmptyName(&'static str),
    InvalidName { field: &'static str, value: String },
    DuplicateParameter(String),
}

impl Display for MetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName(field) => write!(f, "{field} name must not be empty"),
            Self::InvalidName { field, value } => {
                write!(f, "{field} name is not identifier-shaped: `{value}`")
            }
            Self::DuplicateParameter(name) => {
                write!(f, "parameter name declared twice: `{name}`")
            }
        }
    }
}

impl Error for MetadataError {}

fn require_identifier(field: &'static str, value: &str) -> Result<(), MetadataError> {
    if value.trim().is_empty() {
        return Err(MetadataError::EmptyName(field));
    }
    if !is_identifier(value) {
        return Err(MetadataError::InvalidName {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::{MetadataError, QueryMethod, RepositoryMetadata, ResultShape};

    #[test]
    fn identity_key_joins_repository_and_method() {
        let method = QueryMethod::new("UserRepository", "find_by_name");
        assert_eq!(method.identity_key(), "UserRepository.find_by_name");
    }

    #[test]
    fn dynamic_marker_presence_is_carried_by_descriptor() {
        let plain = QueryMethod::new("UserRepository", "find_all");
        assert!(plain.dynamic_query().is_none());

        let marked = QueryMethod::new("UserRepository", "search")
            .with_dynamic_query("SELECT * FROM #{table}");
        assert_eq!(marked.dynamic_query(), Some("SELECT * FROM #{table}"));
    }

    #[test]
    fn validate_rejects_non_identifier_names() {
        let method = QueryMethod::new("User Repository", "find_all");
        assert!(matches!(
            method.validate(),
            Err(MetadataError::InvalidName { field: "repository", .. })
        ));

        let metadata = RepositoryMetadata::new("UserRepository", "User", "");
        assert_eq!(metadata.validate(), Err(MetadataError::EmptyName("table")));
    }

    #[test]
    fn validate_rejects_duplicate_parameters() {
        let method =
            QueryMethod::new("UserRepository", "find_by_name").with_parameters(["name", "name"]);
        assert_eq!(
            method.validate(),
            Err(MetadataError::DuplicateParameter("name".to_string()))
        );
    }

    #[test]
    fn result_shape_defaults_to_many() {
        assert_eq!(
            QueryMethod::new("r", "m").result_shape(),
            ResultShape::Many
        );
    }
}
