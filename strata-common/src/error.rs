//! Common error types for strata

use thiserror::Error;

/// Common result type for strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the strata services
///
/// "Not found" for a base site row is represented as `Ok(None)` at the
/// fetch layer, never as an error; `Error::NotFound` exists for callers
/// (the CLI, batch reporting) that need to surface the condition.
#[derive(Error, Debug)]
pub enum Error {
    /// Backing relational or cache store failure (wraps sqlx::Error).
    /// Aborts an in-progress assembly; no partial cache write happens.
    #[error("Upstream store unavailable: {0}")]
    Upstream(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}
