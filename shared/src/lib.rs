//! Shared types for the dine-in engine
//!
//! Domain models, the order status state machine, realtime fan-out
//! messages and the error system shared by server and clients.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use message::{FanoutEvent, Role, Room, RoomMessage};
pub use order::{OrderStatus, OrderTransition};
