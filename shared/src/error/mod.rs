//! Unified error system for the dine-in engine
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`ErrorKind`]: How a caller reacts (validation / conflict / not found / infrastructure)
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ErrorKind};
//!
//! let err = AppError::new(ErrorCode::CartEmpty);
//! assert_eq!(err.kind(), ErrorKind::Validation);
//!
//! let err = AppError::new(ErrorCode::TableHasActiveSession).with_detail("table_id", 12);
//! assert_eq!(err.kind(), ErrorKind::Conflict);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::{ErrorCategory, ErrorKind};
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
