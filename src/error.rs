//! Error types for the registry.
//!
//! The taxonomy separates request validation failures, search/pagination
//! failures, and failures surfaced by the underlying SQLite store. Store
//! errors are propagated unmodified; this crate performs no retries.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Request validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Search and pagination errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Errors surfaced by the record store
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors in the shape of a page request, detected before any query runs.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Both `after` and `before` cursors were supplied.
    #[error("conflicting cursors: specify only one of 'after' or 'before'")]
    ConflictingCursors,
}

/// Errors related to search and cursor handling.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The pagination cursor failed to decode.
    ///
    /// Raised for bad base64, a missing delimiter, an unparseable timestamp,
    /// or a malformed id. A cursor whose boundary row has since been deleted
    /// is *not* an error: the boundary comparison is purely relational and
    /// the query proceeds.
    #[error("invalid pagination cursor: {cursor}")]
    InvalidCursor { cursor: String },
}

/// Errors originating from the SQLite store.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the store failed.
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Connection pool exhausted.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Internal backend error.
    #[error("internal sqlite error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

impl From<rusqlite::Error> for RegistryError {
    fn from(err: rusqlite::Error) -> Self {
        RegistryError::Backend(BackendError::Internal {
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

impl From<r2d2::Error> for RegistryError {
    fn from(_err: r2d2::Error) -> Self {
        RegistryError::Backend(BackendError::PoolExhausted)
    }
}
