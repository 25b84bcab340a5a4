//! 订单模块
//!
//! - [`OrderOrchestrator`]: 下单、状态流转、订单查询
//! - [`money`]: rust_decimal 金额计算

pub mod error;
pub mod money;
pub mod orchestrator;

pub use error::{OrderError, OrderResult};
pub use orchestrator::OrderOrchestrator;
