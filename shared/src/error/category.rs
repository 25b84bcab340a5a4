//! Error category classification

use super::codes::ErrorCode;
use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 2xxx: Permission errors
/// - 4xxx: Order errors
/// - 6xxx: Product errors
/// - 7xxx: Table / session errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Permission errors (2xxx)
    Permission,
    /// Order errors (4xxx)
    Order,
    /// Product errors (6xxx)
    Product,
    /// Table and session errors (7xxx)
    Table,
    /// System errors (9xxx and unknown ranges)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            2000..3000 => Self::Permission,
            4000..5000 => Self::Order,
            6000..7000 => Self::Product,
            7000..8000 => Self::Table,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Permission => "permission",
            Self::Order => "order",
            Self::Product => "product",
            Self::Table => "table",
            Self::System => "system",
        }
    }
}

/// How a caller should react to an error
///
/// - `Validation`: client-fixable, never retried automatically
/// - `Conflict`: state conflict, the whole operation may be retried when
///   [`ErrorCode::is_retryable`] says so
/// - `NotFound`: missing resource, not retried
/// - `Infrastructure`: store / transport failure, surfaced generically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Infrastructure,
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }

    /// Get the reaction kind for this error code
    pub fn kind(&self) -> ErrorKind {
        let status = self.http_status();
        if status == StatusCode::NOT_FOUND {
            ErrorKind::NotFound
        } else if status == StatusCode::CONFLICT {
            ErrorKind::Conflict
        } else if status.is_server_error() {
            ErrorKind::Infrastructure
        } else {
            ErrorKind::Validation
        }
    }
}
