use thiserror::Error;

/// Typed error taxonomy for the persistence core.
///
/// Every violation surfaces to the caller; nothing is silently swallowed.
/// `InvariantViolation` in particular signals a concurrency bug and should
/// be treated as fatal by callers, not retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced id does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Uniqueness violation on handle or mail at creation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Self-referential edge or malformed input.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A counter would go negative or a duplicate edge row was detected.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Write-lock contention persisted past the bounded retry budget.
    #[error("database busy, write could not be serialized")]
    Busy,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }
}

/// True when the error is a UNIQUE constraint failure.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// True when the error is a FOREIGN KEY constraint failure.
pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

/// True when another writer holds the database lock.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked
    )
}
