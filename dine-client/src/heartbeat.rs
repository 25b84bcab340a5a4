//! 心跳延迟窗口
//!
//! Rolling window of the last N ping round trips. The classification only
//! drives UX (banners, icons); it never decides whether events are trusted.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Connection quality as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionHealth {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

/// Misses in a row that mark the link unhealthy regardless of RTT
const MAX_CONSECUTIVE_MISSES: u32 = 2;

#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
    degraded_after: Duration,
    unhealthy_after: Duration,
    consecutive_misses: u32,
}

impl LatencyWindow {
    pub fn new(capacity: usize, degraded_after: Duration, unhealthy_after: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            degraded_after,
            unhealthy_after,
            consecutive_misses: 0,
        }
    }

    /// Record a pong
    pub fn record(&mut self, rtt: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt);
        self.consecutive_misses = 0;
    }

    /// Record a ping that got no pong before the next one was due
    pub fn record_miss(&mut self) {
        self.consecutive_misses += 1;
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 没有样本时视为健康
    pub fn health(&self) -> ConnectionHealth {
        if self.consecutive_misses >= MAX_CONSECUTIVE_MISSES {
            return ConnectionHealth::Unhealthy;
        }
        match self.average() {
            Some(avg) if avg >= self.unhealthy_after => ConnectionHealth::Unhealthy,
            Some(avg) if avg >= self.degraded_after || self.consecutive_misses > 0 => {
                ConnectionHealth::Degraded
            }
            None if self.consecutive_misses > 0 => ConnectionHealth::Degraded,
            _ => ConnectionHealth::Healthy,
        }
    }

    /// Forget everything (new connection)
    pub fn reset(&mut self) {
        self.samples.clear();
        self.consecutive_misses = 0;
    }
}
