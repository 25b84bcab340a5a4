//! Client configuration

use shared::message::{Role, Room};
use std::time::Duration;

use crate::backoff::ReconnectPolicy;
use crate::heartbeat::LatencyWindow;

/// Fan-out client configuration
///
/// `lan()` suits a display on the restaurant network, `wan()` a client
/// reaching the server over the internet.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g. "ws://192.168.1.10:3000")
    pub server_url: String,
    pub restaurant_id: i64,
    pub role: Role,
    /// Rooms to join; `None` joins every room the role allows
    pub rooms: Option<Vec<Room>>,
    /// Ping cadence
    pub heartbeat_interval: Duration,
    /// RTT samples kept for classification
    pub latency_samples: usize,
    pub degraded_rtt: Duration,
    pub unhealthy_rtt: Duration,
    pub reconnect: ReconnectPolicy,
    /// Events buffered for the application before the socket reader waits
    pub event_buffer: usize,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>, restaurant_id: i64, role: Role) -> Self {
        Self::lan(server_url, restaurant_id, role)
    }

    /// Local network preset: fast heartbeat, tight thresholds
    pub fn lan(server_url: impl Into<String>, restaurant_id: i64, role: Role) -> Self {
        Self {
            server_url: server_url.into(),
            restaurant_id,
            role,
            rooms: None,
            heartbeat_interval: Duration::from_secs(5),
            latency_samples: 10,
            degraded_rtt: Duration::from_millis(150),
            unhealthy_rtt: Duration::from_millis(500),
            reconnect: ReconnectPolicy::new(Duration::from_millis(250), Duration::from_secs(5)),
            event_buffer: 256,
        }
    }

    /// Internet preset: slower heartbeat, looser thresholds, longer backoff
    pub fn wan(server_url: impl Into<String>, restaurant_id: i64, role: Role) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(15),
            degraded_rtt: Duration::from_millis(400),
            unhealthy_rtt: Duration::from_millis(1500),
            reconnect: ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30)),
            ..Self::lan(server_url, restaurant_id, role)
        }
    }

    pub fn with_rooms(mut self, rooms: impl IntoIterator<Item = Room>) -> Self {
        self.rooms = Some(rooms.into_iter().collect());
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_thresholds(mut self, degraded: Duration, unhealthy: Duration) -> Self {
        self.degraded_rtt = degraded;
        self.unhealthy_rtt = unhealthy;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size.max(1);
        self
    }

    pub(crate) fn latency_window(&self) -> LatencyWindow {
        LatencyWindow::new(self.latency_samples, self.degraded_rtt, self.unhealthy_rtt)
    }

    /// `ws://host/ws?restaurant_id=..&role=..[&rooms=..]`
    pub fn socket_url(&self, rooms: Option<&[Room]>) -> String {
        let base = self.server_url.trim_end_matches('/');
        let role = match self.role {
            Role::Kitchen => "kitchen",
            Role::Service => "service",
            Role::Admin => "admin",
        };
        let mut url = format!("{base}/ws?restaurant_id={}&role={role}", self.restaurant_id);
        if let Some(rooms) = rooms.filter(|r| !r.is_empty()) {
            let list: Vec<&str> = rooms.iter().map(|r| r.as_str()).collect();
            url.push_str("&rooms=");
            url.push_str(&list.join(","));
        }
        url
    }
}
