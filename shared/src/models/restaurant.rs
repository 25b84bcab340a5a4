//! Restaurant Model

use serde::{Deserialize, Serialize};

/// Restaurant entity (门店)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    /// Tax rate as a fraction (0.08 = 8%)
    pub tax_rate: f64,
    /// Last allocated order number
    pub order_seq: i64,
    pub created_at: i64,
}

/// Create restaurant payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantCreate {
    pub name: String,
    pub tax_rate: f64,
}
