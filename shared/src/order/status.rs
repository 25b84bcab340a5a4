//! Order lifecycle state machine
//!
//! Single source of truth for which order-status transitions are legal.
//! Pure logic, no I/O: callers persist the new status and trigger fan-out.
//!
//! ```text
//! PENDING → ACCEPTED → PREPARING → READY → DELIVERED → COMPLETED → PAID
//!    │          │           │         │
//!    └──────────┴───────────┴─────────┴──▶ CANCELLED
//! ```
//!
//! `PAID` and `CANCELLED` are terminal. `COMPLETED` is not terminal (it can
//! still be paid) but is *settled*: it carries no pending kitchen or service
//! work, which is what session closing and the inactivity reaper care about.

use crate::error::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum OrderStatus {
    /// 待接单
    #[default]
    Pending,
    /// 已接单
    Accepted,
    /// 制作中
    Preparing,
    /// 已出餐
    Ready,
    /// 已上桌
    Delivered,
    /// 已完成（未付款）
    Completed,
    /// 已付款
    Paid,
    /// 已取消
    Cancelled,
}

/// Canonical happy-path sequence, used for progress reporting
pub const HAPPY_PATH: [OrderStatus; 7] = [
    OrderStatus::Pending,
    OrderStatus::Accepted,
    OrderStatus::Preparing,
    OrderStatus::Ready,
    OrderStatus::Delivered,
    OrderStatus::Completed,
    OrderStatus::Paid,
];

impl OrderStatus {
    /// Every status, in declaration order
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Paid,
        OrderStatus::Cancelled,
    ];

    /// Statuses reachable from `self` in one step
    pub const fn allowed_transitions(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Accepted, Cancelled],
            Accepted => &[Preparing, Cancelled],
            Preparing => &[Ready, Cancelled],
            Ready => &[Delivered, Cancelled],
            Delivered => &[Completed],
            Completed => &[Paid],
            Paid | Cancelled => &[],
        }
    }

    /// No outgoing transitions
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// No pending work left on the order (terminal or completed)
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            OrderStatus::Paid | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// Position along [`HAPPY_PATH`] scaled to 0–100; `CANCELLED` reports 0
    pub fn progress(self) -> u8 {
        match HAPPY_PATH.iter().position(|s| *s == self) {
            Some(idx) => (idx * 100 / (HAPPY_PATH.len() - 1)) as u8,
            None => 0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Paid => "PAID",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected transition; names the allowed set for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid order transition {from} -> {to} (allowed: {allowed:?})")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub allowed: &'static [OrderStatus],
}

impl From<InvalidTransition> for AppError {
    fn from(err: InvalidTransition) -> Self {
        let allowed: Vec<&str> = err.allowed.iter().map(|s| s.as_str()).collect();
        AppError::with_message(ErrorCode::InvalidTransition, err.to_string())
            .with_detail("from", err.from.as_str())
            .with_detail("to", err.to.as_str())
            .with_detail("allowed", allowed)
    }
}

/// A status change that is allowed to be written
///
/// Every status write goes through one of these so the audit trail can tell
/// kitchen/service actions apart from the administrative override used when
/// a session is closed by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderTransition {
    /// Normal lifecycle step, checked against the allow-list
    Validated { from: OrderStatus, to: OrderStatus },
    /// Staff closed the session: unsettled orders are forced to `COMPLETED`
    AdministrativeClose { from: OrderStatus },
}

impl OrderTransition {
    pub fn from(&self) -> OrderStatus {
        match self {
            Self::Validated { from, .. } | Self::AdministrativeClose { from } => *from,
        }
    }

    pub fn to(&self) -> OrderStatus {
        match self {
            Self::Validated { to, .. } => *to,
            Self::AdministrativeClose { .. } => OrderStatus::Completed,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Self::AdministrativeClose { .. })
    }
}

/// `true` iff `next` is in the allow-list for `current`
pub fn is_valid_transition(current: OrderStatus, next: OrderStatus) -> bool {
    current.allowed_transitions().contains(&next)
}

/// Check a transition; self transitions are rejected like any other illegal step
pub fn validate_transition(
    current: OrderStatus,
    next: OrderStatus,
) -> Result<OrderTransition, InvalidTransition> {
    if current != next && is_valid_transition(current, next) {
        Ok(OrderTransition::Validated {
            from: current,
            to: next,
        })
    } else {
        Err(InvalidTransition {
            from: current,
            to: next,
            allowed: current.allowed_transitions(),
        })
    }
}

/// Statuses reachable from `current`
pub fn allowed_transitions(current: OrderStatus) -> &'static [OrderStatus] {
    current.allowed_transitions()
}

pub fn is_terminal(status: OrderStatus) -> bool {
    status.is_terminal()
}

pub fn progress(status: OrderStatus) -> u8 {
    status.progress()
}

/// Administrative override for session close.
///
/// Returns `None` for settled orders, which are left untouched.
pub fn administrative_close(current: OrderStatus) -> Option<OrderTransition> {
    if current.is_settled() {
        None
    } else {
        Some(OrderTransition::AdministrativeClose { from: current })
    }
}
