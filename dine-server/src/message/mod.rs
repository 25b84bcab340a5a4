//! 实时推送
//!
//! # 架构
//!
//! ```text
//! Registry / Orchestrator / Reaper
//!              │ emit(restaurant_id, FanoutEvent)
//!              ▼
//!       ┌──────────────┐
//!       │ FanoutChannel│  一个 event_id，按 event.rooms() 分发
//!       └──────┬───────┘
//!              │
//!     ┌────────┴────────┐
//!     │ PushTransport   │  ◄── 可插拔实现
//!     └────────┬────────┘
//!              ▼
//!          RoomHub  (restaurant_id, room) → broadcast::Sender
//!              │
//!              ▼
//!        GET /ws 连接（按 event_id 去重）
//! ```

pub mod fanout;
pub mod hub;
pub mod transport;
pub mod ws;

pub use fanout::FanoutChannel;
pub use hub::RoomHub;
pub use transport::PushTransport;
