//! 统一错误处理
//!
//! 错误类型统一来自 `shared::error`；`AppError` 已实现 axum `IntoResponse`。

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode, ErrorKind};
