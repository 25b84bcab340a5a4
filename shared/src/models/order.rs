//! Order Model

use crate::order::{OrderStatus, OrderType};
use serde::{Deserialize, Serialize};

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub restaurant_id: i64,
    /// Zero-padded, monotonic per restaurant ("000042")
    pub order_number: String,
    /// `None` for takeaway
    pub table_id: Option<i64>,
    pub session_id: Option<i64>,
    pub customer_name: Option<String>,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub subtotal: f64,
    pub tax: f64,
    pub tip: f64,
    pub discount: f64,
    pub total: f64,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[cfg_attr(feature = "db", sqlx(skip))]
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Order line (订单明细), owned by its order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    /// Product name at order time
    pub product_name: String,
    pub quantity: i32,
    /// Product price at order time
    pub unit_price: f64,
    pub note: Option<String>,
}

/// Cart line submitted by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: i64,
    pub quantity: i32,
    #[serde(default)]
    pub note: Option<String>,
}

/// Where a new order goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum OrderTarget {
    /// Session code from a previous scan
    SessionCode(String),
    /// Table id; a session is opened implicitly when needed
    Table(i64),
}

/// Order creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub restaurant_id: i64,
    /// Required for dine-in, optional for takeaway
    #[serde(default)]
    pub target: Option<OrderTarget>,
    pub items: Vec<OrderItemInput>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tip: f64,
    #[serde(default)]
    pub discount: f64,
}

impl CreateOrderRequest {
    /// Dine-in request against a table
    pub fn dine_in(restaurant_id: i64, target: OrderTarget, items: Vec<OrderItemInput>) -> Self {
        Self {
            restaurant_id,
            target: Some(target),
            items,
            customer_name: None,
            order_type: OrderType::DineIn,
            notes: None,
            tip: 0.0,
            discount: 0.0,
        }
    }

    /// Takeaway request without a table
    pub fn takeaway(restaurant_id: i64, items: Vec<OrderItemInput>) -> Self {
        Self {
            restaurant_id,
            target: None,
            items,
            customer_name: None,
            order_type: OrderType::Takeaway,
            notes: None,
            tip: 0.0,
            discount: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let json = r#"{
            "restaurant_id": 1,
            "target": {"by": "table", "value": 7},
            "items": [{"product_id": 3, "quantity": 2}]
        }"#;
        let req: CreateOrderRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.target, Some(OrderTarget::Table(7)));
        assert_eq!(req.order_type, OrderType::DineIn);
        assert_eq!(req.tip, 0.0);
        assert_eq!(req.items[0].note, None);
    }

    #[test]
    fn test_target_serde() {
        let target = OrderTarget::SessionCode("ABCD2345".into());
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json, serde_json::json!({"by": "session_code", "value": "ABCD2345"}));
    }
}
