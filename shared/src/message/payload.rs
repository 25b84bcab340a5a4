//! 推送事件及其负载

use super::Room;
use crate::models::Order;
use crate::order::{CloseReason, OrderStatus};
use serde::{Deserialize, Serialize};

/// 订单状态变化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdatedPayload {
    pub order_id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub previous_status: OrderStatus,
    pub table_number: Option<String>,
}

/// 会话创建
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub session_id: i64,
    pub session_code: String,
    pub table_id: i64,
    pub table_number: String,
}

/// 会话关闭
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClosedPayload {
    pub session_id: i64,
    pub session_code: String,
    pub table_id: i64,
    pub table_number: String,
    pub reason: CloseReason,
}

/// 桌台变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePayload {
    pub table_id: i64,
    pub table_number: String,
    pub available: bool,
}

/// 状态变更推送事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum FanoutEvent {
    #[serde(rename = "order:new")]
    OrderNew(Box<Order>),
    #[serde(rename = "order:updated")]
    OrderUpdated(OrderUpdatedPayload),
    #[serde(rename = "session:created")]
    SessionCreated(SessionPayload),
    #[serde(rename = "session:closed")]
    SessionClosed(SessionClosedPayload),
    #[serde(rename = "table:created")]
    TableCreated(TablePayload),
    #[serde(rename = "table:updated")]
    TableUpdated(TablePayload),
    #[serde(rename = "table:deleted")]
    TableDeleted(TablePayload),
}

impl FanoutEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            FanoutEvent::OrderNew(_) => "order:new",
            FanoutEvent::OrderUpdated(_) => "order:updated",
            FanoutEvent::SessionCreated(_) => "session:created",
            FanoutEvent::SessionClosed(_) => "session:closed",
            FanoutEvent::TableCreated(_) => "table:created",
            FanoutEvent::TableUpdated(_) => "table:updated",
            FanoutEvent::TableDeleted(_) => "table:deleted",
        }
    }

    /// Audience of the event
    pub fn rooms(&self) -> &'static [Room] {
        match self {
            FanoutEvent::OrderNew(_) | FanoutEvent::OrderUpdated(_) => {
                &[Room::Kitchen, Room::Service, Room::Admin]
            }
            FanoutEvent::SessionCreated(_) => &[Room::Admin],
            FanoutEvent::SessionClosed(_)
            | FanoutEvent::TableCreated(_)
            | FanoutEvent::TableUpdated(_)
            | FanoutEvent::TableDeleted(_) => &[Room::Admin, Room::Service],
        }
    }
}
