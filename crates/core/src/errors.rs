//! Core error types for Tidemark.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for snapshot capture and compaction.
///
/// Nothing in this enum is fatal to the host process. Per-account variants
/// abort one unit of work, whole-run variants abort one job run, and the next
/// scheduled run is the retry.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Snapshot store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Valuation unavailable for account {account_id}: {reason}")]
    ValuationUnavailable { account_id: String, reason: String },

    #[error("Job '{0}' is already running")]
    LockContention(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Failed to publish snapshot update: {0}")]
    Publish(String),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Shorthand for a valuation failure on one account.
    pub fn valuation_unavailable(account_id: &str, reason: impl Into<String>) -> Self {
        Error::ValuationUnavailable {
            account_id: account_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable label used in run reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) | Error::StoreUnavailable(_) => "store_unavailable",
            Error::ValuationUnavailable { .. } => "valuation_unavailable",
            Error::LockContention(_) => "lock_contention",
            Error::ConstraintViolation(_) => "constraint_violation",
            Error::Publish(_) => "publish_failed",
            Error::Validation(_) | Error::InvalidConfigValue(_) => "invalid_input",
            Error::Unexpected(_) => "unexpected",
        }
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
