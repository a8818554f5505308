//! Store error types

use thiserror::Error;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller supplied something the store will not persist (blank title, bad parent, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl StoreError {
    /// True for failures of the underlying engine rather than of the request.
    ///
    /// Callers use this to tell the user to retry (or reset the database)
    /// instead of fixing their input.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Json(_) | Self::Io(_) | Self::Catalog(_)
        )
    }
}

/// Result alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
