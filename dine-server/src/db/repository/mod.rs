//! Repository Module
//!
//! Free functions over SQLite. Single-statement helpers take any
//! [`SqliteExecutor`](sqlx::SqliteExecutor) so they run against the pool or
//! inside a caller's transaction; multi-statement helpers take the
//! transaction itself.

pub mod dining_table;
pub mod order;
pub mod product;
pub mod restaurant;
pub mod table_session;

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepoError::Duplicate(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => RepoError::NotFound("row not found".into()),
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Database(msg) => {
                tracing::error!(error = %msg, "Repository database error");
                AppError::database(msg)
            }
        }
    }
}

impl RepoError {
    /// Unique violation on the generated primary key of `table`
    pub fn is_id_conflict(&self, table: &str) -> bool {
        matches!(self, RepoError::Duplicate(msg) if msg.ends_with(&format!(" {table}.id")))
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_error_to_app_error() {
        let err: AppError = RepoError::Duplicate("x".into()).into();
        assert_eq!(err.code, ErrorCode::AlreadyExists);

        let err: AppError = RepoError::Database("disk".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);

        let err: AppError = RepoError::from(sqlx::Error::RowNotFound).into();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_id_conflict_names_the_table() {
        let err = RepoError::Duplicate("UNIQUE constraint failed: orders.id".into());
        assert!(err.is_id_conflict("orders"));
        assert!(!err.is_id_conflict("table_sessions"));

        let number = RepoError::Duplicate(
            "UNIQUE constraint failed: orders.restaurant_id, orders.order_number".into(),
        );
        assert!(!number.is_id_conflict("orders"));
        assert!(!RepoError::Database("orders.id".into()).is_id_conflict("orders"));
    }
}
