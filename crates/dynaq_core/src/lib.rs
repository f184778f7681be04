//! Repository query resolution with a pluggable dynamic-query path.
//!
//! At bootstrap, each repository method descriptor is resolved once into an
//! executable query object. Methods carrying a dynamic query source go
//! through [`DynamicQueryLookupStrategy`]'s template path; everything else
//! falls through to the default declared/derived resolution.

pub mod db;
pub mod eval;
pub mod extractor;
pub mod logging;
pub mod projection;
pub mod query;
pub mod repository;
pub mod template;

pub use db::{open_db, open_db_in_memory, DbError, PersistenceContext};
pub use eval::{EvaluationContext, EvaluationContextProvider, StandardEvaluationContextProvider};
pub use extractor::{QueryExtractor, SqliteQueryExtractor};
pub use logging::{default_log_level, init_logging, logging_status};
pub use projection::{ProjectionFactory, ProjectionRecord, ScalarValue};
pub use query::{
    DeclaredQueryLookupStrategy, DynamicQueryLookupStrategy, QueryExecError, QueryLookupStrategy,
    QueryOutcome, QueryResolveError, RepositoryQuery, StrategyConfigError, StrategyKey,
};
pub use repository::metadata::{QueryMethod, RepositoryMetadata, ResultShape};
pub use repository::named::{NamedQueries, NamedQueryDefinition};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
