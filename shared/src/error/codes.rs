//! Unified error codes for the dine-in engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 2xxx: Permission errors
//! - 4xxx: Order errors
//! - 6xxx: Product errors
//! - 7xxx: Table / session errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Role may not join the requested room
    RoomNotAllowed = 2002,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Status transition not allowed by the order lifecycle
    InvalidTransition = 4002,
    /// Cart has no items
    CartEmpty = 4007,
    /// Money field is negative, non-finite or drives the subtotal negative
    InvalidAmount = 4008,
    /// Item quantity out of range
    InvalidQuantity = 4009,
    /// Order number allocation collided with an existing order
    OrderNumberConflict = 4010,
    /// Order status changed concurrently
    OrderStatusChanged = 4011,
    /// Dine-in order requires a table or session
    OrderTargetRequired = 4012,

    // ==================== 6xxx: Product ====================
    /// Product not found
    ProductNotFound = 6001,

    // ==================== 7xxx: Table ====================
    /// Table not found
    TableNotFound = 7001,
    /// Table still has an active session
    TableHasActiveSession = 7002,
    /// Table number already used in this restaurant
    TableNumberExists = 7003,
    /// Session not found
    SessionNotFound = 7101,
    /// Session is already closed
    SessionClosed = 7102,
    /// Session still has orders with pending work
    SessionHasPendingOrders = 7103,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Timeout error
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Push transport unavailable
    TransportUnavailable = 9302,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether a caller may retry the whole operation unchanged
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::OrderNumberConflict | ErrorCode::NetworkError | ErrorCode::TimeoutError
        )
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::RoomNotAllowed => "Role may not join this room",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Order status transition is not allowed",
            ErrorCode::CartEmpty => "Cart is empty",
            ErrorCode::InvalidAmount => "Invalid amount",
            ErrorCode::InvalidQuantity => "Invalid item quantity",
            ErrorCode::OrderNumberConflict => "Order number already allocated",
            ErrorCode::OrderStatusChanged => "Order status changed, reload and retry",
            ErrorCode::OrderTargetRequired => "Dine-in order requires a table or session",

            // Product
            ErrorCode::ProductNotFound => "Product not found",

            // Table
            ErrorCode::TableNotFound => "Table not found",
            ErrorCode::TableHasActiveSession => "Table has an active session",
            ErrorCode::TableNumberExists => "Table number already exists",
            ErrorCode::SessionNotFound => "Session not found",
            ErrorCode::SessionClosed => "Session is closed",
            ErrorCode::SessionHasPendingOrders => "Session has orders with pending work",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::TransportUnavailable => "Push transport unavailable",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::InvalidFormat),

            // Permission
            2001 => Ok(ErrorCode::PermissionDenied),
            2002 => Ok(ErrorCode::RoomNotAllowed),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::InvalidTransition),
            4007 => Ok(ErrorCode::CartEmpty),
            4008 => Ok(ErrorCode::InvalidAmount),
            4009 => Ok(ErrorCode::InvalidQuantity),
            4010 => Ok(ErrorCode::OrderNumberConflict),
            4011 => Ok(ErrorCode::OrderStatusChanged),
            4012 => Ok(ErrorCode::OrderTargetRequired),

            // Product
            6001 => Ok(ErrorCode::ProductNotFound),

            // Table
            7001 => Ok(ErrorCode::TableNotFound),
            7002 => Ok(ErrorCode::TableHasActiveSession),
            7003 => Ok(ErrorCode::TableNumberExists),
            7101 => Ok(ErrorCode::SessionNotFound),
            7102 => Ok(ErrorCode::SessionClosed),
            7103 => Ok(ErrorCode::SessionHasPendingOrders),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),
            9302 => Ok(ErrorCode::TransportUnavailable),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
