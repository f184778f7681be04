//! Query resolution contracts.
//!
//! # Responsibility
//! - Define the executable query object and pluggable lookup strategy
//!   contracts.
//! - Define the resolution/execution error taxonomy shared by all
//!   strategies.
//!
//! # Invariants
//! - Resolution happens once per repository method at bootstrap; the
//!   returned query object is what the repository proxy invokes thereafter.
//! - Resolution is deterministic: the same method always takes the same
//!   strategy branch.

use crate::db::DbError;
use crate::eval::EvalError;
use crate::projection::{ProjectionError, ProjectionFactory, ProjectionRecord, ScalarValue};
use crate::repository::metadata::{MetadataError, QueryMethod, RepositoryMetadata};
use crate::repository::named::NamedQueries;
use crate::template::{TemplateParseError, TemplateRenderError};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod declared;
pub mod derived;
pub mod dynamic;
pub mod lookup;

pub use declared::DeclaredQueryLookupStrategy;
pub use dynamic::{DynamicQueryMethod, DynamicRepositoryQuery};
pub use lookup::{DynamicQueryLookupStrategy, StrategyConfigError};

/// Selects how the default strategy resolves a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKey {
    /// Derive from the method name only.
    Create,
    /// Require a declared (named) query.
    UseDeclaredQuery,
    /// Prefer a declared query, derive when absent.
    CreateIfNotFound,
}

impl Default for StrategyKey {
    fn default() -> Self {
        Self::CreateIfNotFound
    }
}

/// Result of executing a resolved query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Records(Vec<ProjectionRecord>),
    Count(i64),
    Exists(bool),
}

/// Executable query object owned by the repository proxy after resolution.
///
/// `Debug` is part of the contract so resolved queries stay inspectable in
/// bootstrap diagnostics and test assertions.
pub trait RepositoryQuery: Send + Sync + std::fmt::Debug {
    /// The method this query was resolved for.
    fn method(&self) -> &QueryMethod;

    /// Executes the query with positional call arguments.
    fn execute(&self, args: &[ScalarValue]) -> Result<QueryOutcome, QueryExecError>;
}

/// Pluggable policy deciding how a repository method's query is resolved.
pub trait QueryLookupStrategy: Send + Sync {
    /// Resolves one repository method into an executable query object.
    fn resolve(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        projections: &ProjectionFactory,
        named_queries: &NamedQueries,
    ) -> Result<Box<dyn RepositoryQuery>, QueryResolveError>;
}

/// Errors raised while resolving a method into a query object.
#[derive(Debug)]
pub enum QueryResolveError {
    Metadata(MetadataError),
    /// `UseDeclaredQuery` was requested but no named query exists.
    MissingDeclaredQuery {
        key: String,
    },
    /// The method name cannot be derived into a query.
    Underivable {
        key: String,
        reason: String,
    },
    /// Derived or declared parameters disagree with the method declaration.
    UnknownParameter {
        key: String,
        parameter: String,
    },
    /// Declared SQL shape contradicts the method's declared result shape.
    ShapeMismatch {
        key: String,
        detail: String,
    },
    /// The dynamic path was taken for a method without a dynamic source.
    MissingDynamicSource {
        key: String,
    },
    Template(TemplateParseError),
    Splice(TemplateRenderError),
}

impl Display for QueryResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata(err) => write!(f, "{err}"),
            Self::MissingDeclaredQuery { key } => {
                write!(f, "method `{key}` requires a declared query but none is registered")
            }
            Self::Underivable { key, reason } => {
                write!(f, "cannot derive a query for method `{key}`: {reason}")
            }
            Self::UnknownParameter { key, parameter } => write!(
                f,
                "query for `{key}` references `:{parameter}` which is not a declared method parameter"
            ),
            Self::ShapeMismatch { key, detail } => {
                write!(f, "query shape for `{key}` contradicts the method declaration: {detail}")
            }
            Self::MissingDynamicSource { key } => {
                write!(f, "method `{key}` carries no dynamic query source")
            }
            Self::Template(err) => write!(f, "{err}"),
            Self::Splice(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Metadata(err) => Some(err),
            Self::Template(err) => Some(err),
            Self::Splice(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MetadataError> for QueryResolveError {
    fn from(value: MetadataError) -> Self {
        Self::Metadata(value)
    }
}

impl From<TemplateParseError> for QueryResolveError {
    fn from(value: TemplateParseError) -> Self {
        Self::Template(value)
    }
}

/// Errors raised while executing a resolved query.
#[derive(Debug)]
pub enum QueryExecError {
    Eval(EvalError),
    Render(TemplateRenderError),
    /// Declared SQL references a parameter the call did not supply.
    UnboundParameter(String),
    /// A `One`-shaped query matched more than one row.
    NonUnique {
        count: usize,
    },
    Connection(&'static str),
    Projection(ProjectionError),
    Db(DbError),
}

impl Display for QueryExecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eval(err) => write!(f, "{err}"),
            Self::Render(err) => write!(f, "{err}"),
            Self::UnboundParameter(name) => {
                write!(f, "no argument supplies bind parameter `:{name}`")
            }
            Self::NonUnique { count } => {
                write!(f, "query declared a single result but matched {count} rows")
            }
            Self::Connection(message) => write!(f, "{message}"),
            Self::Projection(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryExecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Eval(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::Projection(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::UnboundParameter(_) | Self::NonUnique { .. } | Self::Connection(_) => None,
        }
    }
}

impl From<EvalError> for QueryExecError {
    fn from(value: EvalError) -> Self {
        Self::Eval(value)
    }
}

impl From<TemplateRenderError> for QueryExecError {
    fn from(value: TemplateRenderError) -> Self {
        Self::Render(value)
    }
}

impl From<ProjectionError> for QueryExecError {
    fn from(value: ProjectionError) -> Self {
        Self::Projection(value)
    }
}

impl From<DbError> for QueryExecError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for QueryExecError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
