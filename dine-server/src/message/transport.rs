//! PushTransport 推送传输层抽象

use async_trait::async_trait;
use shared::message::{Room, RoomMessage};

use crate::utils::AppError;

/// 房间发布原语
///
/// 实现只负责把一条消息投递到 `(restaurant_id, room)`，不做重试，
/// 不保证送达。
#[async_trait]
pub trait PushTransport: Send + Sync + std::fmt::Debug {
    /// Publish to one room; returns the number of live receivers reached
    async fn publish(
        &self,
        restaurant_id: i64,
        room: Room,
        message: RoomMessage,
    ) -> Result<usize, AppError>;
}
