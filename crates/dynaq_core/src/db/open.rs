//! Connection bootstrap for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory connections with the pragmas query execution
//!   relies on.
//! - Emit `db_open` logging events with duration and status.

use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a SQLite database file configured for query execution.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    bootstrapped("file", || Connection::open(path))
}

/// Opens an in-memory SQLite database configured for query execution.
pub fn open_db_in_memory() -> DbResult<Connection> {
    bootstrapped("memory", Connection::open_in_memory)
}

fn bootstrapped(
    mode: &str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = open().map_err(Into::into).and_then(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::{open_db, open_db_in_memory};

    #[test]
    fn in_memory_connection_has_foreign_keys_on() {
        let conn = open_db_in_memory().expect("in-memory open");
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("pragma read");
        assert_eq!(enabled, 1);
    }

    #[test]
    fn file_connection_opens_and_reopens() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("queries.sqlite3");

        {
            let conn = open_db(&path).expect("first open");
            conn.execute_batch("CREATE TABLE probe (id INTEGER);")
                .expect("schema");
        }

        let conn = open_db(&path).expect("reopen");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'probe';",
                [],
                |row| row.get(0),
            )
            .expect("table probe");
        assert_eq!(count, 1);
    }
}
