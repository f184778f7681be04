//! Dynamic-query lookup strategy adapter.
//!
//! # Responsibility
//! - Decide per repository method whether to build a dynamic query object or
//!   delegate to the framework's default resolution strategy.
//!
//! # Invariants
//! - The fallback strategy is built once at construction and reused for all
//!   non-dynamic methods.
//! - Dynamic methods never touch the fallback; non-dynamic methods pass
//!   through verbatim.
//! - The adapter validates nothing beyond marker presence; collaborator
//!   errors propagate unchanged.

use crate::db::PersistenceContext;
use crate::eval::EvaluationContextProvider;
use crate::extractor::QueryExtractor;
use crate::projection::ProjectionFactory;
use crate::query::declared::DeclaredQueryLookupStrategy;
use crate::query::dynamic::{DynamicQueryMethod, DynamicRepositoryQuery};
use crate::query::{QueryLookupStrategy, QueryResolveError, RepositoryQuery, StrategyKey};
use crate::repository::metadata::{QueryMethod, RepositoryMetadata};
use crate::repository::named::NamedQueries;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Lookup strategy that detects dynamic queries declared on the method
/// descriptor and falls back to the default strategy for everything else.
pub struct DynamicQueryLookupStrategy {
    persistence: Arc<PersistenceContext>,
    extractor: Arc<dyn QueryExtractor>,
    evaluation: Arc<dyn EvaluationContextProvider>,
    fallback: Box<dyn QueryLookupStrategy>,
}

impl DynamicQueryLookupStrategy {
    /// Builds the adapter from wiring-supplied collaborators.
    ///
    /// The three mandatory collaborators arrive as options from dependency
    /// wiring; each absence fails with an error naming the argument. The
    /// optional `key` defaults to [`StrategyKey::CreateIfNotFound`].
    ///
    /// This is the sole supported construction path for production wiring.
    pub fn create(
        persistence: Option<Arc<PersistenceContext>>,
        key: Option<StrategyKey>,
        extractor: Option<Arc<dyn QueryExtractor>>,
        evaluation: Option<Arc<dyn EvaluationContextProvider>>,
    ) -> Result<Self, StrategyConfigError> {
        let persistence = persistence.ok_or(StrategyConfigError::MissingPersistenceContext)?;
        let extractor = extractor.ok_or(StrategyConfigError::MissingQueryExtractor)?;
        let evaluation =
            evaluation.ok_or(StrategyConfigError::MissingEvaluationContextProvider)?;

        let fallback = DeclaredQueryLookupStrategy::new(
            Arc::clone(&persistence),
            key.unwrap_or_default(),
            Arc::clone(&extractor),
            Arc::clone(&evaluation),
        );
        Ok(Self {
            persistence,
            extractor,
            evaluation,
            fallback: Box::new(fallback),
        })
    }

    /// Builds the adapter around an externally supplied fallback strategy.
    ///
    /// Used by tests that need an instrumented delegate; production wiring
    /// goes through [`DynamicQueryLookupStrategy::create`].
    pub fn with_fallback(
        persistence: Arc<PersistenceContext>,
        extractor: Arc<dyn QueryExtractor>,
        evaluation: Arc<dyn EvaluationContextProvider>,
        fallback: Box<dyn QueryLookupStrategy>,
    ) -> Self {
        Self {
            persistence,
            extractor,
            evaluation,
            fallback,
        }
    }

    fn is_dynamic(method: &QueryMethod) -> bool {
        method.dynamic_query().is_some()
    }
}

impl std::fmt::Debug for DynamicQueryLookupStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicQueryLookupStrategy")
            .finish_non_exhaustive()
    }
}

impl QueryLookupStrategy for DynamicQueryLookupStrategy {
    fn resolve(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        projections: &ProjectionFactory,
        named_queries: &NamedQueries,
    ) -> Result<Box<dyn RepositoryQuery>, QueryResolveError> {
        if Self::is_dynamic(method) {
            let query_method =
                DynamicQueryMethod::new(method, metadata, projections, self.extractor.as_ref())?;
            Ok(Box::new(DynamicRepositoryQuery::new(
                query_method,
                Arc::clone(&self.persistence),
                Arc::clone(&self.evaluation),
            )))
        } else {
            self.fallback
                .resolve(method, metadata, projections, named_queries)
        }
    }
}

/// Missing-mandatory-argument errors raised by
/// [`DynamicQueryLookupStrategy::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyConfigError {
    MissingPersistenceContext,
    MissingQueryExtractor,
    MissingEvaluationContextProvider,
}

impl Display for StrategyConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPersistenceContext => {
                write!(f, "persistence context must not be absent")
            }
            Self::MissingQueryExtractor => write!(f, "query extractor must not be absent"),
            Self::MissingEvaluationContextProvider => {
                write!(f, "evaluation context provider must not be absent")
            }
        }
    }
}

impl Error for StrategyConfigError {}
