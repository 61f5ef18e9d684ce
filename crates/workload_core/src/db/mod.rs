//! SQLite connection bootstrap and storage-level errors.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the apps service.
//! - Resolve a process-level connection string into a storage handle.
//! - Define the error type every storage port implementation reports.
//!
//! # Invariants
//! - Driver errors are carried untranslated; callers decide wrapping.
//! - Opening a database never creates application tables. Schema bootstrap
//!   belongs to the service layer.

use crate::storage::ScanError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;

pub use open::{open_db, open_db_in_memory, open_storage};

pub type DbResult<T> = Result<T, DbError>;

/// Errors surfaced by storage port implementations.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Scan(ScanError),
    /// The request-scoped context was cancelled before or during the call.
    Cancelled,
    ConnectionPoisoned,
    UnsupportedUrl(String),
    /// Failure reported by a non-SQLite backend.
    Backend(String),
}

impl DbError {
    /// Returns whether the underlying driver rejected a write because of a
    /// primary-key or unique constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            ),
            _ => false,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Scan(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "storage call cancelled"),
            Self::ConnectionPoisoned => {
                write!(f, "database connection lock poisoned by a panicked caller")
            }
            Self::UnsupportedUrl(url) => write!(f, "unsupported database url `{url}`"),
            Self::Backend(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Scan(err) => Some(err),
            Self::Cancelled
            | Self::ConnectionPoisoned
            | Self::UnsupportedUrl(_)
            | Self::Backend(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ScanError> for DbError {
    fn from(value: ScanError) -> Self {
        Self::Scan(value)
    }
}
