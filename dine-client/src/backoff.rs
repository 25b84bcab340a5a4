//! Reconnect backoff
//!
//! Capped exponential delay with jitter; retries never give up.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for the base delay
    pub max_delay: Duration,
    /// Fraction of the base delay that is randomized, `0.0..=1.0`
    pub jitter: f64,
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            jitter: 0.5,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay for the `attempt`-th retry (0-based) before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 0..attempt {
            if delay >= self.max_delay {
                break;
            }
            delay = (delay * 2).min(self.max_delay);
        }
        delay
    }

    /// Jittered delay in `[base × (1 − jitter), base]`
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let spread = base.mul_f64(self.jitter);
        let cut = rand::thread_rng().gen_range(Duration::ZERO..=spread);
        base - cut
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}
