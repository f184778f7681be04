use dynaq_core::query::QueryResolveError;
use dynaq_core::{
    DeclaredQueryLookupStrategy, NamedQueries, NamedQueryDefinition, PersistenceContext,
    ProjectionFactory, QueryExecError, QueryLookupStrategy, QueryMethod, QueryOutcome,
    RepositoryMetadata, ResultShape, ScalarValue, SqliteQueryExtractor,
    StandardEvaluationContextProvider, StrategyKey,
};
use std::sync::Arc;

fn seeded_persistence() -> Arc<PersistenceContext> {
    let persistence = PersistenceContext::open_in_memory().expect("in-memory context");
    persistence
        .execute_batch(
            "CREATE TABLE users (id INTEGER, name TEXT, city TEXT, age INTEGER);
             INSERT INTO users VALUES
                (1, 'ada', 'london', 36),
                (2, 'grace', 'arlington', 45),
                (3, 'edsger', 'austin', 72),
                (4, 'barbara', 'london', 70);",
        )
        .expect("fixtures");
    Arc::new(persistence)
}

fn strategy(persistence: Arc<PersistenceContext>, key: StrategyKey) -> DeclaredQueryLookupStrategy {
    DeclaredQueryLookupStrategy::new(
        persistence,
        key,
        Arc::new(SqliteQueryExtractor::new()),
        Arc::new(StandardEvaluationContextProvider::new()),
    )
}

fn users_metadata() -> RepositoryMetadata {
    RepositoryMetadata::new("UserRepository", "User", "users")
}

#[test]
fn named_query_with_splice_and_binds_executes() {
    let persistence = seeded_persistence();
    let mut named = NamedQueries::new();
    named
        .register(
            "UserRepository.find_older_than",
            "SELECT * FROM #{table} WHERE age > :min_age ORDER BY id",
        )
        .expect("registration");

    let method =
        QueryMethod::new("UserRepository", "find_older_than").with_parameters(["min_age"]);
    let query = strategy(persistence, StrategyKey::CreateIfNotFound)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &named)
        .expect("resolution");

    let QueryOutcome::Records(records) = query
        .execute(&[ScalarValue::from(44)])
        .expect("execution")
    else {
        panic!("expected records");
    };
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].get("name"), Some(&ScalarValue::Text("grace".to_string())));
}

#[test]
fn use_declared_key_requires_a_named_query() {
    let persistence = seeded_persistence();
    let method = QueryMethod::new("UserRepository", "find_all");
    let err = strategy(persistence, StrategyKey::UseDeclaredQuery)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &NamedQueries::new())
        .expect_err("no declared query registered");

    assert!(matches!(
        err,
        QueryResolveError::MissingDeclaredQuery { key } if key == "UserRepository.find_all"
    ));
}

#[test]
fn create_key_ignores_registered_named_queries() {
    let persistence = seeded_persistence();
    let mut named = NamedQueries::new();
    named
        .register("UserRepository.find_all", "SELECT * FROM users WHERE age > 100")
        .expect("registration");

    let method = QueryMethod::new("UserRepository", "find_all");
    let query = strategy(persistence, StrategyKey::Create)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &named)
        .expect("derived resolution");

    let QueryOutcome::Records(records) = query.execute(&[]).expect("execution") else {
        panic!("expected records");
    };
    // Derived find_all ignores the (empty-result) named query above.
    assert_eq!(records.len(), 4);
}

#[test]
fn derived_find_by_and_exists_execute() {
    let persistence = seeded_persistence();
    let lookup = strategy(persistence, StrategyKey::CreateIfNotFound);
    let metadata = users_metadata();
    let projections = ProjectionFactory::new();
    let named = NamedQueries::new();

    let find = QueryMethod::new("UserRepository", "find_by_city").with_parameters(["city"]);
    let query = lookup
        .resolve(&find, &metadata, &projections, &named)
        .expect("derived find");
    let QueryOutcome::Records(records) = query
        .execute(&[ScalarValue::from("london")])
        .expect("execution")
    else {
        panic!("expected records");
    };
    assert_eq!(records.len(), 2);

    let exists = QueryMethod::new("UserRepository", "exists_by_name").with_parameters(["name"]);
    let query = lookup
        .resolve(&exists, &metadata, &projections, &named)
        .expect("derived exists");
    assert_eq!(
        query.execute(&[ScalarValue::from("ada")]).expect("execution"),
        QueryOutcome::Exists(true)
    );
    assert_eq!(
        query.execute(&[ScalarValue::from("nobody")]).expect("execution"),
        QueryOutcome::Exists(false)
    );
}

#[test]
fn one_shaped_method_rejects_multiple_matches() {
    let persistence = seeded_persistence();
    let method = QueryMethod::new("UserRepository", "find_by_city")
        .with_parameters(["city"])
        .with_result_shape(ResultShape::One);
    let query = strategy(persistence, StrategyKey::CreateIfNotFound)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &NamedQueries::new())
        .expect("derived resolution");

    let err = query
        .execute(&[ScalarValue::from("london")])
        .expect_err("two rows in london");
    assert!(matches!(err, QueryExecError::NonUnique { count: 2 }));

    let QueryOutcome::Records(records) = query
        .execute(&[ScalarValue::from("austin")])
        .expect("single match")
    else {
        panic!("expected records");
    };
    assert_eq!(records.len(), 1);
}

#[test]
fn named_query_with_undeclared_parameter_fails_at_resolve_time() {
    let persistence = seeded_persistence();
    let mut named = NamedQueries::new();
    named
        .register("UserRepository.find_special", "SELECT * FROM users WHERE city = :region")
        .expect("registration");

    let method = QueryMethod::new("UserRepository", "find_special").with_parameters(["city"]);
    let err = strategy(persistence, StrategyKey::CreateIfNotFound)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &named)
        .expect_err("unknown :region parameter");
    assert!(matches!(
        err,
        QueryResolveError::UnknownParameter { parameter, .. } if parameter == "region"
    ));
}

#[test]
fn scalar_named_query_with_record_shape_fails_at_resolve_time() {
    let persistence = seeded_persistence();
    let mut named = NamedQueries::new();
    named
        .register("UserRepository.find_total", "SELECT COUNT(*) FROM users")
        .expect("registration");

    let method = QueryMethod::new("UserRepository", "find_total");
    let err = strategy(persistence, StrategyKey::CreateIfNotFound)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &named)
        .expect_err("scalar SQL under Many shape");
    assert!(matches!(err, QueryResolveError::ShapeMismatch { .. }));
}

#[test]
fn record_named_query_with_count_shape_fails_at_resolve_time() {
    let persistence = seeded_persistence();
    let mut named = NamedQueries::new();
    named
        .register("UserRepository.count_all", "SELECT * FROM users")
        .expect("registration");

    let method =
        QueryMethod::new("UserRepository", "count_all").with_result_shape(ResultShape::Count);
    let err = strategy(persistence, StrategyKey::CreateIfNotFound)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &named)
        .expect_err("record SQL under Count shape");
    assert!(matches!(err, QueryResolveError::ShapeMismatch { .. }));
}

#[test]
fn registry_loaded_from_json_resolves_count_query() {
    let persistence = seeded_persistence();
    let definitions: Vec<NamedQueryDefinition> = serde_json::from_str(
        r#"[{"key": "UserRepository.count_seniors", "sql": "SELECT COUNT(*) FROM #{table} WHERE age >= :threshold"}]"#,
    )
    .expect("definitions json");
    let named = NamedQueries::from_definitions(definitions).expect("registry");

    let method = QueryMethod::new("UserRepository", "count_seniors")
        .with_parameters(["threshold"])
        .with_result_shape(ResultShape::Count);
    let query = strategy(persistence, StrategyKey::CreateIfNotFound)
        .resolve(&method, &users_metadata(), &ProjectionFactory::new(), &named)
        .expect("resolution");

    assert_eq!(
        query.execute(&[ScalarValue::from(70)]).expect("execution"),
        QueryOutcome::Count(2)
    );
}
