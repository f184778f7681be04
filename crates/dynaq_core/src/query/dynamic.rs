//! Dynamic query method wrapper and executable query.
//!
//! # Responsibility
//! - Wrap a marked method together with its metadata, projection factory and
//!   parsed template.
//! - Execute by building an evaluation context per call, rendering the
//!   template and running the result.
//!
//! # Invariants
//! - Construction requires the dynamic marker; templates parse once at
//!   resolve time, never per call.
//! - Every bind the template references must be a declared method parameter.

use crate::db::PersistenceContext;
use crate::eval::EvaluationContextProvider;
use crate::extractor::QueryExtractor;
use crate::projection::{ProjectionFactory, ScalarValue};
use crate::query::{QueryExecError, QueryOutcome, QueryResolveError, RepositoryQuery};
use crate::repository::metadata::{QueryMethod, RepositoryMetadata, ResultShape};
use crate::template::QueryTemplate;
use log::debug;
use std::sync::Arc;

/// A marked method wrapped with everything needed to render its query.
pub struct DynamicQueryMethod {
    method: QueryMethod,
    metadata: RepositoryMetadata,
    projections: ProjectionFactory,
    template: QueryTemplate,
}

impl DynamicQueryMethod {
    /// Wraps `method`, parsing and validating its dynamic source.
    pub fn new(
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        projections: &ProjectionFactory,
        extractor: &dyn QueryExtractor,
    ) -> Result<Self, QueryResolveError> {
        method.validate()?;
        metadata.validate()?;

        let source = method
            .dynamic_query()
            .ok_or_else(|| QueryResolveError::MissingDynamicSource {
                key: method.identity_key(),
            })?;
        let template = QueryTemplate::parse(source)?;

        let shape = extractor.extract(source);
        for parameter in &shape.parameters {
            if !method.parameters().contains(parameter) {
                return Err(QueryResolveError::UnknownParameter {
                    key: method.identity_key(),
                    parameter: parameter.clone(),
                });
            }
        }
        if shape.scalar
            && matches!(method.result_shape(), ResultShape::Many | ResultShape::One)
        {
            return Err(QueryResolveError::ShapeMismatch {
                key: method.identity_key(),
                detail: "dynamic source yields a scalar but the method expects records"
                    .to_string(),
            });
        }
        if !shape.scalar
            && matches!(method.result_shape(), ResultShape::Count | ResultShape::Exists)
        {
            return Err(QueryResolveError::ShapeMismatch {
                key: method.identity_key(),
                detail: "dynamic source yields records but the method expects a scalar"
                    .to_string(),
            });
        }

        debug!(
            "event=query_resolve module=query status=ok path=dynamic method={} parameters={}",
            method.identity_key(),
            template.bind_names().len()
        );
        Ok(Self {
            method: method.clone(),
            metadata: metadata.clone(),
            projections: projections.clone(),
            template,
        })
    }

    pub fn method(&self) -> &QueryMethod {
        &self.method
    }

    pub fn metadata(&self) -> &RepositoryMetadata {
        &self.metadata
    }
}

/// Executable dynamic query owned by the repository proxy.
pub struct DynamicRepositoryQuery {
    query_method: DynamicQueryMethod,
    persistence: Arc<PersistenceContext>,
    evaluation: Arc<dyn EvaluationContextProvider>,
}

impl DynamicRepositoryQuery {
    pub fn new(
        query_method: DynamicQueryMethod,
        persistence: Arc<PersistenceContext>,
        evaluation: Arc<dyn EvaluationContextProvider>,
    ) -> Self {
        Self {
            query_method,
            persistence,
            evaluation,
        }
    }
}

impl std::fmt::Debug for DynamicRepositoryQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicRepositoryQuery")
            .field("method", &self.query_method.method.identity_key())
            .field("template", &self.query_method.template.source())
            .finish_non_exhaustive()
    }
}

impl RepositoryQuery for DynamicRepositoryQuery {
    fn method(&self) -> &QueryMethod {
        self.query_method.method()
    }

    fn execute(&self, args: &[ScalarValue]) -> Result<QueryOutcome, QueryExecError> {
        let method = self.query_method.method();
        let context = self.evaluation.evaluation_context(
            method,
            self.query_method.metadata(),
            args,
        )?;
        let rendered = self.query_method.template.render(&context)?;
        debug!(
            "event=query_exec module=query path=dynamic method={} binds={}",
            method.identity_key(),
            rendered.binds.len()
        );
        self.persistence.run(
            &rendered.sql,
            &rendered.binds,
            method.result_shape(),
            &self.query_method.projections,
        )
    }
}
