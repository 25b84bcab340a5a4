//! Order orchestrator errors

use shared::error::{AppError, ErrorCode};
use shared::order::InvalidTransition;
use thiserror::Error;

use crate::db::repository::RepoError;
use crate::sessions::SessionError;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    CartEmpty,

    #[error("Invalid quantity for product {product_id}: {quantity}")]
    InvalidQuantity { product_id: i64, quantity: i32 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Dine-in order requires a table or session")]
    TargetRequired,

    #[error("Order number {0} already allocated")]
    NumberConflict(String),

    #[error("Order {0} status changed concurrently")]
    StatusChanged(i64),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::Repo(err.into())
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        let message = err.to_string();
        match err {
            OrderError::CartEmpty => AppError::new(ErrorCode::CartEmpty),
            OrderError::InvalidQuantity {
                product_id,
                quantity,
            } => AppError::with_message(ErrorCode::InvalidQuantity, message)
                .with_detail("product_id", product_id)
                .with_detail("quantity", quantity),
            OrderError::InvalidAmount(_) => AppError::with_message(ErrorCode::InvalidAmount, message),
            OrderError::ProductNotFound(id) => {
                AppError::with_message(ErrorCode::ProductNotFound, message).with_detail("product_id", id)
            }
            OrderError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, message).with_detail("order_id", id)
            }
            OrderError::TargetRequired => AppError::new(ErrorCode::OrderTargetRequired),
            OrderError::NumberConflict(_) => {
                AppError::with_message(ErrorCode::OrderNumberConflict, message)
            }
            OrderError::StatusChanged(id) => {
                AppError::with_message(ErrorCode::OrderStatusChanged, message).with_detail("order_id", id)
            }
            OrderError::InvalidTransition(e) => e.into(),
            OrderError::Session(e) => e.into(),
            OrderError::Repo(e) => e.into(),
        }
    }
}

pub type OrderResult<T> = Result<T, OrderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::error::ErrorKind;
    use shared::order::{OrderStatus, validate_transition};

    #[test]
    fn test_error_codes() {
        let err: AppError = OrderError::CartEmpty.into();
        assert_eq!(err.code, ErrorCode::CartEmpty);
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: AppError = OrderError::NumberConflict("000007".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.code.is_retryable());

        let transition = validate_transition(OrderStatus::Paid, OrderStatus::Pending).unwrap_err();
        let err: AppError = OrderError::from(transition).into();
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        let err: AppError = OrderError::Session(SessionError::SessionClosed("ABCD".into())).into();
        assert_eq!(err.code, ErrorCode::SessionClosed);
    }
}
