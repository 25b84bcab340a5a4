//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity, read-only for the order engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub restaurant_id: i64,
    pub name: String,
    /// Current price; orders snapshot it at creation
    pub price: f64,
    pub is_active: bool,
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub price: f64,
}
