//! Result-shape projection over raw SQLite rows.
//!
//! # Responsibility
//! - Define the owned scalar value type shared by binding and result paths.
//! - Build projection records from rusqlite rows, optionally restricted to a
//!   declared column subset.
//!
//! # Invariants
//! - Column order in a record is deterministic: row order, or declared order
//!   when the factory is restricted.
//! - A restricted factory fails loudly on a missing column instead of
//!   silently dropping it.

use rusqlite::types::{Value, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Owned SQL scalar crossing the bind/result boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ScalarValue {
    /// Returns whether this value is SQL null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts to the rusqlite owned value for statement binding.
    pub fn to_sql_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) => Value::Integer(*value),
            Self::Real(value) => Value::Real(*value),
            Self::Text(value) => Value::Text(value.clone()),
            Self::Blob(value) => Value::Blob(value.clone()),
        }
    }

    fn from_value_ref(value: ValueRef<'_>) -> Self {
        match Value::from(value) {
            Value::Null => Self::Null,
            Value::Integer(value) => Self::Integer(value),
            Value::Real(value) => Self::Real(value),
            Value::Text(value) => Self::Text(value),
            Value::Blob(value) => Self::Blob(value),
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Blob(value) => write!(f, "<blob {} bytes>", value.len()),
        }
    }
}

/// One result row as ordered column/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRecord {
    columns: Vec<String>,
    values: Vec<ScalarValue>,
}

impl ProjectionRecord {
    /// Returns the value for `column`, if projected.
    pub fn get(&self, column: &str) -> Option<&ScalarValue> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|idx| &self.values[idx])
    }

    /// Projected column names in record order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Projected values in record order.
    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Projection construction errors.
#[derive(Debug)]
pub enum ProjectionError {
    MissingColumn(String),
    Row(rusqlite::Error),
}

impl Display for ProjectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingColumn(column) => {
                write!(f, "projected column `{column}` is absent from the result row")
            }
            Self::Row(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MissingColumn(_) => None,
            Self::Row(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for ProjectionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Row(value)
    }
}

/// Builds [`ProjectionRecord`]s from result rows.
///
/// An unrestricted factory projects every row column in row order. A factory
/// restricted via [`ProjectionFactory::with_columns`] projects exactly the
/// declared subset, in declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionFactory {
    declared: Option<Vec<String>>,
}

impl ProjectionFactory {
    /// Creates an unrestricted factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory restricted to the given column subset.
    pub fn with_columns(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            declared: Some(columns.into_iter().map(Into::into).collect()),
        }
    }

    /// Declared column subset, if any.
    pub fn declared_columns(&self) -> Option<&[String]> {
        self.declared.as_deref()
    }

    /// Projects one result row into a record.
    pub fn project_row(&self, row: &Row<'_>) -> Result<ProjectionRecord, ProjectionError> {
        let stmt = row.as_ref();
        let row_columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();

        match self.declared.as_ref() {
            None => {
                let mut values = Vec::with_capacity(row_columns.len());
                for idx in 0..row_columns.len() {
                    values.push(ScalarValue::from_value_ref(row.get_ref(idx)?));
                }
                Ok(ProjectionRecord {
                    columns: row_columns,
                    values,
                })
            }
            Some(declared) => {
                let mut columns = Vec::with_capacity(declared.len());
                let mut values = Vec::with_capacity(declared.len());
                for column in declared {
                    let idx = row_columns
                        .iter()
                        .position(|name| name == column)
                        .ok_or_else(|| ProjectionError::MissingColumn(column.clone()))?;
                    columns.push(column.clone());
                    values.push(ScalarValue::from_value_ref(row.get_ref(idx)?));
                }
                Ok(ProjectionRecord { columns, values })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectionError, ProjectionFactory, ScalarValue};
    use rusqlite::Connection;

    fn sample_connection() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory connection");
        conn.execute_batch(
            "CREATE TABLE people (id INTEGER, name TEXT, score REAL);
             INSERT INTO people VALUES (7, 'ada', 0.5);",
        )
        .expect("sample schema");
        conn
    }

    #[test]
    fn unrestricted_factory_projects_row_order() {
        let conn = sample_connection();
        let record = conn
            .query_row("SELECT id, name, score FROM people", [], |row| {
                Ok(ProjectionFactory::new().project_row(row))
            })
            .expect("query")
            .expect("projection");

        assert_eq!(record.columns(), &["id", "name", "score"]);
        assert_eq!(record.get("id"), Some(&ScalarValue::Integer(7)));
        assert_eq!(record.get("name"), Some(&ScalarValue::Text("ada".to_string())));
        assert_eq!(record.get("score"), Some(&ScalarValue::Real(0.5)));
    }

    #[test]
    fn restricted_factory_projects_declared_order() {
        let conn = sample_connection();
        let factory = ProjectionFactory::with_columns(["name", "id"]);
        let record = conn
            .query_row("SELECT id, name, score FROM people", [], |row| {
                Ok(factory.project_row(row))
            })
            .expect("query")
            .expect("projection");

        assert_eq!(record.columns(), &["name", "id"]);
        assert_eq!(record.values().len(), 2);
    }

    #[test]
    fn restricted_factory_rejects_missing_column() {
        let conn = sample_connection();
        let factory = ProjectionFactory::with_columns(["absent"]);
        let err = conn
            .query_row("SELECT id FROM people", [], |row| {
                Ok(factory.project_row(row))
            })
            .expect("query")
            .expect_err("missing column must fail");

        assert!(matches!(err, ProjectionError::MissingColumn(column) if column == "absent"));
    }

    #[test]
    fn scalar_value_null_detection_and_conversion() {
        assert!(ScalarValue::Null.is_null());
        assert!(!ScalarValue::from(1).is_null());
        assert_eq!(
            ScalarValue::from("x").to_sql_value(),
            rusqlite::types::Value::Text("x".to_string())
        );
    }
}
