//! Order-side enums shared by server and client

use serde::{Deserialize, Serialize};

/// 订单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderType {
    /// 堂食
    #[default]
    DineIn,
    /// 外带
    Takeaway,
}

impl OrderType {
    /// Dine-in orders must be bound to an active table session
    pub fn requires_session(self) -> bool {
        matches!(self, OrderType::DineIn)
    }
}

/// 会话关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CloseReason {
    /// Staff closed the session
    Manual,
    /// Reaper: session never received an order
    NoOrders,
    /// Reaper: newest order older than the inactivity threshold
    Inactivity,
    /// Staff lifted the table
    TableLifted,
}

impl CloseReason {
    /// Explicit closes force unsettled orders to `COMPLETED`
    pub fn is_administrative(self) -> bool {
        matches!(self, CloseReason::Manual | CloseReason::TableLifted)
    }
}
