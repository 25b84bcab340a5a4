//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Dining table entity (桌台)
///
/// `available` is `false` exactly while an active session references the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DiningTable {
    pub id: i64,
    pub restaurant_id: i64,
    /// Table number shown to staff, unique per restaurant
    pub number: String,
    pub capacity: i32,
    pub available: bool,
    /// Token encoded in the table's QR code
    pub qr_token: String,
    pub created_at: i64,
}

/// Create dining table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTableCreate {
    pub number: String,
    pub capacity: Option<i32>,
}
