//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `dynaq_core` resolution wiring.
//! - Keep output deterministic for quick local sanity checks.

use dynaq_core::{
    DynamicQueryLookupStrategy, NamedQueries, PersistenceContext, ProjectionFactory,
    QueryLookupStrategy, QueryMethod, QueryOutcome, RepositoryMetadata, ScalarValue,
    SqliteQueryExtractor, StandardEvaluationContextProvider,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("dynaq_core version={}", dynaq_core::core_version());
    match smoke_resolution() {
        Ok(count) => {
            println!("dynaq_core smoke=ok rows={count}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("dynaq_core smoke=error {message}");
            ExitCode::FAILURE
        }
    }
}

fn smoke_resolution() -> Result<usize, String> {
    let persistence =
        Arc::new(PersistenceContext::open_in_memory().map_err(|err| err.to_string())?);
    persistence
        .execute_batch(
            "CREATE TABLE users (id INTEGER, name TEXT, city TEXT);
             INSERT INTO users VALUES (1, 'ada', 'london'), (2, 'grace', 'arlington');",
        )
        .map_err(|err| err.to_string())?;

    let strategy = DynamicQueryLookupStrategy::create(
        Some(Arc::clone(&persistence)),
        None,
        Some(Arc::new(SqliteQueryExtractor::new())),
        Some(Arc::new(StandardEvaluationContextProvider::new())),
    )
    .map_err(|err| err.to_string())?;

    let metadata = RepositoryMetadata::new("UserRepository", "User", "users");
    let method = QueryMethod::new("UserRepository", "search")
        .with_parameters(["city"])
        .with_dynamic_query("SELECT * FROM #{table} WHERE 1 = 1[[ AND city = :city]]");

    let query = strategy
        .resolve(&method, &metadata, &ProjectionFactory::new(), &NamedQueries::new())
        .map_err(|err| err.to_string())?;
    let outcome = query
        .execute(&[ScalarValue::from("london")])
        .map_err(|err| err.to_string())?;

    match outcome {
        QueryOutcome::Records(records) => Ok(records.len()),
        other => Err(format!("unexpected outcome {other:?}")),
    }
}
