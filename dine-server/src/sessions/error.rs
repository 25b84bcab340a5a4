//! Session registry errors

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::db::repository::RepoError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table {0} has an active session")]
    TableHasActiveSession(i64),

    #[error("Table number already exists: {0}")]
    TableNumberExists(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Session {0} still has orders with pending work")]
    HasPendingOrders(i64),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        SessionError::Repo(err.into())
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::SessionNotFound(_) => {
                AppError::with_message(ErrorCode::SessionNotFound, message)
            }
            SessionError::TableNotFound(_) => AppError::with_message(ErrorCode::TableNotFound, message),
            SessionError::TableHasActiveSession(table_id) => {
                AppError::with_message(ErrorCode::TableHasActiveSession, message)
                    .with_detail("table_id", table_id)
            }
            SessionError::TableNumberExists(_) => {
                AppError::with_message(ErrorCode::TableNumberExists, message)
            }
            SessionError::SessionClosed(_) => AppError::with_message(ErrorCode::SessionClosed, message),
            SessionError::HasPendingOrders(session_id) => {
                AppError::with_message(ErrorCode::SessionHasPendingOrders, message)
                    .with_detail("session_id", session_id)
            }
            SessionError::Repo(e) => e.into(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorKind;

    #[test]
    fn test_error_kinds() {
        let err: AppError = SessionError::TableHasActiveSession(4).into();
        assert_eq!(err.code, ErrorCode::TableHasActiveSession);
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err: AppError = SessionError::SessionNotFound("XYZ".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: AppError = SessionError::Repo(RepoError::Database("io".into())).into();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }
}
