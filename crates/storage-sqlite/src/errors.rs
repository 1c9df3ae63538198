//! Storage-specific error types for SQLite operations.
//!
//! Diesel and r2d2 errors are wrapped here and converted to the
//! database-agnostic types in `tidemark_core` before leaving the crate.

use diesel::result::Error as DieselError;
use thiserror::Error;
use tidemark_core::errors::{DatabaseError, Error};

/// Storage-specific errors that wrap Diesel and r2d2 types.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("Query execution failed: {0}")]
    QueryFailed(#[from] DieselError),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Writer unavailable: {0}")]
    WriterUnavailable(String),

    #[error(transparent)]
    Core(Error),
}

/// Lets write jobs return core errors through the transaction wrapper
/// without losing the variant.
impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::Core(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => Error::StoreUnavailable(e.to_string()),
            StorageError::PoolError(e) => Error::StoreUnavailable(e.to_string()),
            StorageError::WriterUnavailable(e) => Error::StoreUnavailable(e),
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::QueryFailed(DieselError::RollbackTransaction)
            | StorageError::QueryFailed(DieselError::AlreadyInTransaction)
            | StorageError::QueryFailed(DieselError::BrokenTransactionManager) => Error::Database(
                DatabaseError::TransactionFailed("transaction aborted".to_string()),
            ),
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::SerializationError(e) => Error::Database(DatabaseError::Internal(e)),
            StorageError::Core(e) => e,
        }
    }
}

/// Extension trait for converting Diesel and r2d2 results to core results.
pub trait IntoCore<T> {
    fn into_core(self) -> tidemark_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> tidemark_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> tidemark_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_survive_round_trip() {
        let err: Error =
            StorageError::from(Error::ConstraintViolation("backfill".to_string())).into();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn test_not_found_maps_to_database_error() {
        let err: Error = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
        assert_eq!(err.kind(), "store_unavailable");
    }

    #[test]
    fn test_writer_unavailable_is_store_unavailable() {
        let err: Error = StorageError::WriterUnavailable("stopped".to_string()).into();
        assert!(matches!(err, Error::StoreUnavailable(_)));
    }
}
