//! Table Session Model

use crate::order::CloseReason;
use serde::{Deserialize, Serialize};

/// One dine-in occupancy of a table (桌台会话)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TableSession {
    pub id: i64,
    pub table_id: i64,
    pub restaurant_id: i64,
    /// Short opaque code handed to the customer
    pub session_code: String,
    pub active: bool,
    pub customer_name: Option<String>,
    pub created_at: i64,
    pub closed_at: Option<i64>,
    pub close_reason: Option<CloseReason>,
}

/// How a caller identifies the session it wants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum SessionLookup {
    /// Existing session code (must already exist)
    Code(String),
    /// Table id; an active session is created when none exists
    Table(i64),
}
