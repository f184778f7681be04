//! SQLite bootstrap and the shared persistence handle.
//!
//! # Responsibility
//! - Open and configure connections for query execution.
//! - Expose the long-lived [`context::PersistenceContext`] handle the query
//!   layer executes against.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - The query layer never closes the connection; the handle lives as long
//!   as the repository wiring that owns it.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod context;
mod open;

pub use context::PersistenceContext;
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
