//! Expression-evaluation contexts for query rendering.
//!
//! # Responsibility
//! - Define the variable environment a dynamic template renders against.
//! - Provide the standard binding rule: method parameter names map to
//!   positional call arguments; repository metadata contributes splice
//!   variables.
//!
//! # Invariants
//! - Contexts are value maps; providers never mutate inputs.
//! - Arity mismatches fail before any SQL is rendered.

use crate::projection::ScalarValue;
use crate::repository::metadata::{QueryMethod, RepositoryMetadata};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Variable environment for one render.
///
/// Binds are values attached to `:name` parameters. Splices are raw SQL text
/// fragments expanded at `#{name}` sites (entity/table names).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationContext {
    binds: BTreeMap<String, ScalarValue>,
    splices: BTreeMap<String, String>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a bind value under `name`, replacing any previous value.
    pub fn bind(&mut self, name: impl Into<String>, value: ScalarValue) {
        self.binds.insert(name.into(), value);
    }

    /// Attaches a splice fragment under `name`.
    pub fn splice(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.splices.insert(name.into(), text.into());
    }

    pub fn bind_value(&self, name: &str) -> Option<&ScalarValue> {
        self.binds.get(name)
    }

    pub fn splice_text(&self, name: &str) -> Option<&str> {
        self.splices.get(name).map(String::as_str)
    }

    /// Whether `name` is bound to a non-null value.
    pub fn is_bound_non_null(&self, name: &str) -> bool {
        self.binds.get(name).is_some_and(|value| !value.is_null())
    }
}

/// Evaluation errors raised while building a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArityMismatch {
                method,
                expected,
                actual,
            } => write!(
                f,
                "method `{method}` declares {expected} parameter(s) but was called with {actual}"
            ),
        }
    }
}

impl Error for EvalError {}

/// Supplies the context needed to evaluate expressions in query definitions.
pub trait EvaluationContextProvider: Send + Sync {
    /// Builds the full environment for one execution of `method`.
    fn evaluation_context(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        args: &[ScalarValue],
    ) -> Result<EvaluationContext, EvalError>;

    /// Builds the argument-free environment used when resolving declared
    /// queries (splice variables only).
    fn splice_context(&self, metadata: &RepositoryMetadata) -> EvaluationContext;
}

/// Standard provider: positional arguments bound by declared parameter name,
/// `entity` and `table` splices from repository metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardEvaluationContextProvider;

impl StandardEvaluationContextProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EvaluationContextProvider for StandardEvaluationContextProvider {
    fn evaluation_context(
        &self,
        method: &QueryMethod,
        metadata: &RepositoryMetadata,
        args: &[ScalarValue],
    ) -> Result<EvaluationContext, EvalError> {
        if method.parameters().len() != args.len() {
            return Err(EvalError::ArityMismatch {
                method: method.identity_key(),
                expected: method.parameters().len(),
                actual: args.len(),
            });
        }

        let mut context = self.splice_context(metadata);
        for (name, value) in method.parameters().iter().zip(args.iter()) {
            context.bind(name.clone(), value.clone());
        }
        Ok(context)
    }

    fn splice_context(&self, metadata: &RepositoryMetadata) -> EvaluationContext {
        let mut context = EvaluationContext::new();
        context.splice("entity", metadata.entity());
        context.splice("table", metadata.table());
        context
    }
}
