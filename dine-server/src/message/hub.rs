//! 进程内房间中心
//!
//! 每个 `(restaurant_id, room)` 一个有界 `broadcast` 通道。发布从不等待
//! 慢客户端：缓冲满时最旧的消息被覆盖，落后的接收者收到 `Lagged`。

use async_trait::async_trait;
use dashmap::DashMap;
use shared::message::{Room, RoomMessage};
use tokio::sync::broadcast;

use super::transport::PushTransport;
use crate::utils::AppError;

/// Default per-room buffer
pub const DEFAULT_ROOM_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct RoomHub {
    rooms: DashMap<(i64, Room), broadcast::Sender<RoomMessage>>,
    capacity: usize,
}

impl RoomHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Join a room
    pub fn subscribe(&self, restaurant_id: i64, room: Room) -> broadcast::Receiver<RoomMessage> {
        self.rooms
            .entry((restaurant_id, room))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Live receivers in a room
    pub fn member_count(&self, restaurant_id: i64, room: Room) -> usize {
        self.rooms
            .get(&(restaurant_id, room))
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop channels nobody listens to any more
    pub fn prune(&self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, tx| tx.receiver_count() > 0);
        before - self.rooms.len()
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_CAPACITY)
    }
}

#[async_trait]
impl PushTransport for RoomHub {
    async fn publish(
        &self,
        restaurant_id: i64,
        room: Room,
        message: RoomMessage,
    ) -> Result<usize, AppError> {
        let Some(tx) = self.rooms.get(&(restaurant_id, room)) else {
            return Ok(0);
        };
        // send 只在没有接收者时失败，这不算错误
        Ok(tx.send(message).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::{FanoutEvent, TablePayload};
    use uuid::Uuid;

    fn message(restaurant_id: i64, room: Room) -> RoomMessage {
        RoomMessage {
            event_id: Uuid::new_v4(),
            restaurant_id,
            room,
            timestamp: 0,
            event: FanoutEvent::TableCreated(TablePayload {
                table_id: 1,
                table_number: "1".into(),
                available: true,
            }),
        }
    }

    #[tokio::test]
    async fn test_rooms_are_isolated_per_restaurant() {
        let hub = RoomHub::new(8);
        let mut kitchen_a = hub.subscribe(1, Room::Kitchen);
        let mut kitchen_b = hub.subscribe(2, Room::Kitchen);

        let reached = hub.publish(1, Room::Kitchen, message(1, Room::Kitchen)).await.unwrap();
        assert_eq!(reached, 1);
        assert_eq!(kitchen_a.recv().await.unwrap().restaurant_id, 1);
        assert!(kitchen_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_members() {
        let hub = RoomHub::new(8);
        assert_eq!(hub.publish(1, Room::Admin, message(1, Room::Admin)).await.unwrap(), 0);

        let rx = hub.subscribe(1, Room::Admin);
        drop(rx);
        assert_eq!(hub.publish(1, Room::Admin, message(1, Room::Admin)).await.unwrap(), 0);
        assert_eq!(hub.prune(), 1);
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips() {
        let hub = RoomHub::new(2);
        let mut rx = hub.subscribe(1, Room::Service);
        for _ in 0..5 {
            hub.publish(1, Room::Service, message(1, Room::Service)).await.unwrap();
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!(rx.recv().await.is_ok());
    }
}
