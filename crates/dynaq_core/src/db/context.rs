//! Shared persistence handle.
//!
//! # Responsibility
//! - Hold the connection resolved query objects execute against.
//! - Turn rendered SQL plus ordered bind values into typed query outcomes.
//!
//! # Invariants
//! - The handle is shareable behind `Arc` after construction; one statement
//!   runs at a time through the inner mutex.
//! - `One`-shaped results with more than one row fail instead of truncating.

use super::{open_db, open_db_in_memory, DbResult};
use crate::projection::{ProjectionFactory, ScalarValue};
use crate::query::{QueryExecError, QueryOutcome};
use crate::repository::metadata::ResultShape;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Long-lived handle over the connection query objects run against.
pub struct PersistenceContext {
    conn: Mutex<Connection>,
}

impl PersistenceContext {
    /// Wraps an already-bootstrapped connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens a file-backed context.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens an in-memory context.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Runs positional SQL and shapes the result.
    pub fn run(
        &self,
        sql: &str,
        binds: &[ScalarValue],
        shape: ResultShape,
        projections: &ProjectionFactory,
    ) -> Result<QueryOutcome, QueryExecError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| QueryExecError::Connection("persistence context mutex poisoned"))?;
        let params = binds.iter().map(ScalarValue::to_sql_value);

        match shape {
            ResultShape::Count => {
                let count: i64 =
                    conn.query_row(sql, params_from_iter(params), |row| row.get(0))?;
                Ok(QueryOutcome::Count(count))
            }
            ResultShape::Exists => {
                let flag: i64 =
                    conn.query_row(sql, params_from_iter(params), |row| row.get(0))?;
                Ok(QueryOutcome::Exists(flag != 0))
            }
            ResultShape::Many | ResultShape::One => {
                let mut stmt = conn.prepare(sql)?;
                let mut rows = stmt.query(params_from_iter(params))?;
                let mut records = Vec::new();
                while let Some(row) = rows.next()? {
                    records.push(projections.project_row(row)?);
                }
                if shape == ResultShape::One && records.len() > 1 {
                    return Err(QueryExecError::NonUnique {
                        count: records.len(),
                    });
                }
                Ok(QueryOutcome::Records(records))
            }
        }
    }

    /// Runs side-effecting setup SQL (schema, fixtures) on the shared handle.
    pub fn execute_batch(&self, sql: &str) -> Result<(), QueryExecError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| QueryExecError::Connection("persistence context mutex poisoned"))?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}
