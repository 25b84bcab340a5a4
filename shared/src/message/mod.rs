//! 实时推送消息类型定义
//!
//! 这些类型在 dine-server 和 clients 之间共享：
//! 房间 ([`Room`]) / 角色 ([`Role`]) / 推送事件 ([`FanoutEvent`]) / WebSocket 帧。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod dedup;
pub mod payload;
pub use dedup::RecentIds;
pub use payload::*;

/// 协议版本号
pub const PROTOCOL_VERSION: u16 = 1;

/// 推送房间（按门店隔离）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Room {
    /// 后厨
    Kitchen,
    /// 前厅服务
    Service,
    /// 管理端
    Admin,
}

impl Room {
    pub const ALL: [Room; 3] = [Room::Kitchen, Room::Service, Room::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Room::Kitchen => "kitchen",
            Room::Service => "service",
            Room::Admin => "admin",
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Room {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kitchen" => Ok(Room::Kitchen),
            "service" => Ok(Room::Service),
            "admin" => Ok(Room::Admin),
            other => Err(format!("unknown room: {other}")),
        }
    }
}

/// 连接角色，决定可加入的房间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Kitchen,
    Service,
    Admin,
}

impl Role {
    /// Rooms a connection with this role may join
    pub fn allowed_rooms(&self) -> &'static [Room] {
        match self {
            Role::Kitchen => &[Room::Kitchen],
            Role::Service => &[Room::Service],
            Role::Admin => &Room::ALL,
        }
    }

    pub fn can_join(&self, room: Room) -> bool {
        self.allowed_rooms().contains(&room)
    }

    /// Rooms joined when the client does not ask for specific ones
    pub fn default_rooms(&self) -> Vec<Room> {
        self.allowed_rooms().to_vec()
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kitchen" => Ok(Role::Kitchen),
            "service" => Ok(Role::Service),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// 房间内投递的一条事件
///
/// 同一事件发往多个房间时共享 `event_id`，客户端按它去重。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMessage {
    pub event_id: Uuid,
    pub restaurant_id: i64,
    pub room: Room,
    pub timestamp: i64,
    pub event: FanoutEvent,
}

/// 客户端 → 服务端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Heartbeat; echoed back as `pong`
    Ping { nonce: u64 },
    Join { room: Room },
    Leave { room: Room },
}

/// 服务端 → 客户端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Sent once after the upgrade
    Welcome {
        connection_id: Uuid,
        protocol_version: u16,
        rooms: Vec<Room>,
    },
    Event(RoomMessage),
    Pong { nonce: u64 },
    /// Room membership changed
    Rooms { rooms: Vec<Room> },
    Error { code: u16, message: String },
}
