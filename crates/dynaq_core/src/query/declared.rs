//! Default query lookup strategy.
//!
//! # Responsibility
//! - Resolve methods through the framework's standard paths: a declared
//!   (named) query when registered, otherwise derivation from the method
//!   name, as selected by [`StrategyKey`].
//! - Build the plain executable query object both paths share.
//!
//! # Invariants
//! - Declared SQL may use `#{entity}`/`#{table}` splices and `:name` binds;
//!   splices expand at resolve time, binds at execution time.
//! - Every bind parameter must be a declared method parameter; unknown names
//!   fail at resolve time.

use crate::db::PersistenceContext;
use crate::eval::EvaluationContextProvider;
use crate::extractor::QueryExtractor;
use crate::projection::{ProjectionFactory, ScalarValue};
use crate::query::{
    QueryExecError, QueryLookupStrategy, QueryOutcome, QueryResolveError, RepositoryQuery,
    StrategyKey,
};
use crate::repository::metadata::{QueryMethod, RepositoryMetadata, ResultShape};
use crate::repository::named::NamedQueries;
use crate::template::expand_splices;
use log::debug;
use std::sync::Arc;

/// The framework's standard lookup strategy.
pub struct DeclaredQueryLookupStrategy {
    persistence: Arc<PersistenceContext>,
    key: StrategyKey,
    extractor: Arc<dyn QueryExtractor>,
    evaluation: Arc<dyn EvaluationContextProvider>,
}

impl DeclaredQueryLookupStrategy {
    pub fn new(
        persistence: Arc<PersistenceContext>,
        key: StrategyKey,
        extractor: Arc<dyn QueryExtractor>,
        evaluation: Arc<dyn EvaluationContextProvider>,
    ) -> Self {
        Self {
            persistence,
            key,
            extractor,
            evaluation,
        }
    }

    fn resolve_declared(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        projections: &ProjectionFactory,
        declared_sql: &str,
    ) -> Result<PlainRepositoryQuery, QueryResolveError> {
        let key = method.identity_key();
        let spliced = expand_splices(declared_sql, &self.evaluation.splice_context(metadata))
            .map_err(QueryResolveError::Splice)?;

        let shape = self.extractor.extract(&spliced);
        for parameter in &shape.parameters {
            if !method.parameters().contains(parameter) {
                return Err(QueryResolveError::UnknownParameter {
                    key,
                    parameter: parameter.clone(),
                });
            }
        }
        if shape.scalar
            && matches!(method.result_shape(), ResultShape::Many | ResultShape::One)
        {
            return Err(QueryResolveError::ShapeMismatch {
                key,
                detail: "declared SQL yields a scalar but the method expects records".to_string(),
            });
        }
        if !shape.scalar
            && matches!(method.result_shape(), ResultShape::Count | ResultShape::Exists)
        {
            return Err(QueryResolveError::ShapeMismatch {
                key,
                detail: "declared SQL yields records but the method expects a scalar".to_string(),
            });
        }

        let positional = self.extractor.positional(&spliced);
        debug!(
            "event=query_resolve module=query status=ok path=declared method={} parameters={}",
            method.identity_key(),
            positional.bindings.len()
        );
        Ok(PlainRepositoryQuery {
            method: method.clone(),
            sql: positional.sql,
            bindings: positional.bindings,
            shape: method.result_shape(),
            persistence: Arc::clone(&self.persistence),
            projections: projections.clone(),
        })
    }

    fn resolve_derived(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        projections: &ProjectionFactory,
    ) -> Result<PlainRepositoryQuery, QueryResolveError> {
        let derived = super::derived::derive_query(method, metadata).map_err(|err| {
            QueryResolveError::Underivable {
                key: method.identity_key(),
                reason: err.to_string(),
            }
        })?;
        debug!(
            "event=query_resolve module=query status=ok path=derived method={} parameters={}",
            method.identity_key(),
            derived.bindings.len()
        );
        Ok(PlainRepositoryQuery {
            method: method.clone(),
            sql: derived.sql,
            bindings: derived.bindings,
            shape: derived.shape,
            persistence: Arc::clone(&self.persistence),
            projections: projections.clone(),
        })
    }
}

impl QueryLookupStrategy for DeclaredQueryLookupStrategy {
    fn resolve(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        projections: &ProjectionFactory,
        named_queries: &NamedQueries,
    ) -> Result<Box<dyn RepositoryQuery>, QueryResolveError> {
        method.validate()?;
        metadata.validate()?;

        let key = method.identity_key();
        let declared = named_queries.lookup(&key);

        let query = match (self.key, declared) {
            (StrategyKey::UseDeclaredQuery, None) => {
                return Err(QueryResolveError::MissingDeclaredQuery { key });
            }
            (StrategyKey::Create, _) | (StrategyKey::CreateIfNotFound, None) => {
                self.resolve_derived(method, metadata, projections)?
            }
            (_, Some(sql)) => self.resolve_declared(method, metadata, projections, sql)?,
        };

        Ok(Box::new(query))
    }
}

/// Executable query backing both declared and derived resolutions.
struct PlainRepositoryQuery {
    method: QueryMethod,
    sql: String,
    bindings: Vec<String>,
    shape: ResultShape,
    persistence: Arc<PersistenceContext>,
    projections: ProjectionFactory,
}

impl std::fmt::Debug for PlainRepositoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlainRepositoryQuery")
            .field("method", &self.method.identity_key())
            .field("sql", &self.sql)
            .field("bindings", &self.bindings)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl RepositoryQuery for PlainRepositoryQuery {
    fn method(&self) -> &QueryMethod {
        &self.method
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<QueryOutcome, QueryExecError> {
        if args.len() != self.method.parameters().len() {
            return Err(QueryExecError::Eval(crate::eval::EvalError::ArityMismatch {
                method: self.method.identity_key(),
                expected: self.method.parameters().len(),
                actual: args.len(),
            }));
        }

        let mut binds = Vec::with_capacity(self.bindings.len());
        for name in &self.bindings {
            let idx = self
                .method
                .parameters()
                .iter()
                .position(|parameter| parameter == name)
                .ok_or_else(|| QueryExecError::UnboundParameter(name.clone()))?;
            binds.push(args[idx].clone());
        }

        self.persistence
            .run(&self.sql, &binds, self.shape, &self.projections)
    }
}
