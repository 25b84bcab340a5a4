//! Dine Client - 实时推送客户端
//!
//! Kitchen displays, service tablets and admin consoles use this crate to
//! follow a restaurant's fan-out rooms:
//!
//! - [`FanoutClient`]: reconnecting WebSocket client with heartbeat and
//!   duplicate suppression
//! - [`LatencyWindow`]: RTT window behind [`ConnectionHealth`]
//! - [`ReconnectPolicy`]: capped exponential backoff with jitter
//! - [`OfflineQueue`]: durable redb queue for orders taken while offline
//!
//! # Example
//!
//! ```ignore
//! use dine_client::{ClientConfig, FanoutClient};
//! use shared::message::Role;
//!
//! let mut client = FanoutClient::spawn(ClientConfig::lan("ws://10.0.0.2:3000", 1, Role::Kitchen));
//! while let Some(msg) = client.next_event().await {
//!     println!("{} in {:?}", msg.event.name(), msg.room);
//! }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod offline_queue;

pub use backoff::ReconnectPolicy;
pub use client::{ClientStatus, FanoutClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use heartbeat::{ConnectionHealth, LatencyWindow};
pub use offline_queue::{
    OfflineQueue, QueueError, QueueResult, QueuedOrder, SyncReport, SyncState,
};

// Re-export shared protocol types for convenience
pub use shared::message::{Role, Room, RoomMessage};
