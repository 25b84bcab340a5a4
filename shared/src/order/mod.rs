//! Order lifecycle types
//!
//! - [`status`]: the order status state machine
//! - [`types`]: order type and session close reason

pub mod status;
pub mod types;

pub use status::{
    HAPPY_PATH, InvalidTransition, OrderStatus, OrderTransition, administrative_close,
    allowed_transitions, is_terminal, is_valid_transition, progress, validate_transition,
};
pub use types::{CloseReason, OrderType};
