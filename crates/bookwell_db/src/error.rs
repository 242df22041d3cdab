//! Error types for the database layer

use bookwell_common::BookwellError;
use thiserror::Error;
use tracing::error;

/// Errors that can occur when working with the database
#[derive(Debug, Error)]
pub enum DbError {
    /// Error from SQLx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Error with the database configuration
    #[error("Database configuration error: {0}")]
    ConfigError(String),

    /// Error with database URL parsing
    #[error("Database URL error: {0}")]
    UrlError(String),

    /// Error with database pool creation
    #[error("Database pool error: {0}")]
    PoolError(String),

    /// A stored value could not be mapped back to the domain model
    #[error("Corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },
}

impl DbError {
    pub fn corrupt(table: &'static str, detail: impl Into<String>) -> Self {
        DbError::CorruptRow {
            table,
            detail: detail.into(),
        }
    }
}

/// Lifts raw SQLx results into [`DbError`] so `?` can continue into
/// `BookwellError` at the storage port.
pub(crate) trait SqlResultExt<T> {
    fn db(self) -> Result<T, DbError>;
}

impl<T> SqlResultExt<T> for Result<T, sqlx::Error> {
    fn db(self) -> Result<T, DbError> {
        self.map_err(DbError::from)
    }
}

// SQLite (extended) result codes and PostgreSQL SQLSTATEs that mean "try again"
const RETRYABLE_CODES: &[&str] = &[
    "5",     // SQLITE_BUSY
    "6",     // SQLITE_LOCKED
    "261",   // SQLITE_BUSY_RECOVERY
    "517",   // SQLITE_BUSY_SNAPSHOT
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

const UNIQUE_CODES: &[&str] = &[
    "2067",  // SQLITE_CONSTRAINT_UNIQUE
    "1555",  // SQLITE_CONSTRAINT_PRIMARYKEY
    "23505", // unique_violation
];

fn classify(err: &sqlx::Error) -> Classified {
    match err {
        sqlx::Error::Database(db) => {
            let code = db.code();
            let code = code.as_deref().unwrap_or_default();
            if db.is_unique_violation() || UNIQUE_CODES.contains(&code) {
                Classified::Unique
            } else if RETRYABLE_CODES.contains(&code) {
                Classified::Transient
            } else {
                Classified::Other
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => Classified::Transient,
        _ => Classified::Other,
    }
}

enum Classified {
    Unique,
    Transient,
    Other,
}

impl From<DbError> for BookwellError {
    fn from(err: DbError) -> Self {
        match &err {
            DbError::SqlxError(inner) => match classify(inner) {
                Classified::Unique => {
                    BookwellError::ConflictError(format!("unique constraint violated: {inner}"))
                }
                Classified::Transient => {
                    BookwellError::TransientError(format!("storage busy: {inner}"))
                }
                Classified::Other => {
                    error!("Database failure: {}", inner);
                    BookwellError::InternalError(err.to_string())
                }
            },
            DbError::ConfigError(_) | DbError::UrlError(_) => {
                BookwellError::ConfigError(err.to_string())
            }
            DbError::PoolError(_) | DbError::CorruptRow { .. } => {
                error!("{}", err);
                BookwellError::InternalError(err.to_string())
            }
        }
    }
}
