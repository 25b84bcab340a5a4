//! Fire-and-forget fan-out of change events

use std::sync::Arc;

use shared::message::{FanoutEvent, RoomMessage};
use uuid::Uuid;

use super::transport::PushTransport;

/// 推送通道
///
/// Constructed once at startup and handed to every component that mutates
/// state. Publishing never fails the caller: transport errors are logged
/// and dropped, there is no outbox and no acknowledgement.
#[derive(Clone, Debug)]
pub struct FanoutChannel {
    transport: Arc<dyn PushTransport>,
}

impl FanoutChannel {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    /// Send `event` to every room in its audience.
    ///
    /// All copies share one `event_id` so a client sitting in several of
    /// those rooms can drop duplicates. Returns the number of deliveries.
    pub async fn emit(&self, restaurant_id: i64, event: FanoutEvent) -> usize {
        let event_id = Uuid::new_v4();
        let timestamp = shared::util::now_millis();
        let name = event.name();
        let mut delivered = 0;

        for room in event.rooms() {
            let message = RoomMessage {
                event_id,
                restaurant_id,
                room: *room,
                timestamp,
                event: event.clone(),
            };
            match self.transport.publish(restaurant_id, *room, message).await {
                Ok(n) => delivered += n,
                Err(e) => {
                    tracing::warn!(
                        restaurant_id,
                        room = %room,
                        event = name,
                        error = %e,
                        "Fan-out publish failed"
                    );
                }
            }
        }

        tracing::debug!(restaurant_id, event = name, %event_id, delivered, "Fan-out event emitted");
        delivered
    }

    /// Emit several events in order
    pub async fn emit_all(&self, restaurant_id: i64, events: impl IntoIterator<Item = FanoutEvent>) {
        for event in events {
            self.emit(restaurant_id, event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RoomHub;
    use crate::utils::AppError;
    use async_trait::async_trait;
    use shared::message::{Room, SessionPayload, TablePayload};

    #[derive(Debug)]
    struct BrokenTransport;

    #[async_trait]
    impl PushTransport for BrokenTransport {
        async fn publish(&self, _: i64, _: Room, _: RoomMessage) -> Result<usize, AppError> {
            Err(AppError::transport("socket gone"))
        }
    }

    fn table_event() -> FanoutEvent {
        FanoutEvent::TableUpdated(TablePayload {
            table_id: 3,
            table_number: "3".into(),
            available: false,
        })
    }

    #[tokio::test]
    async fn test_emit_reaches_audience_with_shared_id() {
        let hub = Arc::new(RoomHub::new(16));
        let channel = FanoutChannel::new(hub.clone());
        let mut admin = hub.subscribe(9, Room::Admin);
        let mut service = hub.subscribe(9, Room::Service);
        let mut kitchen = hub.subscribe(9, Room::Kitchen);

        assert_eq!(channel.emit(9, table_event()).await, 2);

        let a = admin.recv().await.unwrap();
        let s = service.recv().await.unwrap();
        assert_eq!(a.event_id, s.event_id);
        assert_eq!(a.room, Room::Admin);
        assert_eq!(s.room, Room::Service);
        assert!(kitchen.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_created_only_to_admin() {
        let hub = Arc::new(RoomHub::new(16));
        let channel = FanoutChannel::new(hub.clone());
        let mut service = hub.subscribe(1, Room::Service);
        let mut admin = hub.subscribe(1, Room::Admin);

        channel
            .emit(
                1,
                FanoutEvent::SessionCreated(SessionPayload {
                    session_id: 1,
                    session_code: "ABCDEFGH".into(),
                    table_id: 2,
                    table_number: "2".into(),
                }),
            )
            .await;
        assert_eq!(admin.recv().await.unwrap().event.name(), "session:created");
        assert!(service.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_transport_errors_are_swallowed() {
        let channel = FanoutChannel::new(Arc::new(BrokenTransport));
        assert_eq!(channel.emit(1, table_event()).await, 0);
    }
}
