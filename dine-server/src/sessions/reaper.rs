//! 闲置会话巡检
//!
//! Closes sessions nobody is using any more:
//! - no orders at all → closed on the first sweep (`NO_ORDERS`)
//! - every order settled and the newest one untouched for longer than the
//!   threshold → closed (`INACTIVITY`)
//! - any order with pending work → left alone
//!
//! Closing goes through [`SessionRegistry::close_session`], which re-checks
//! for pending orders inside its transaction, so an order placed between
//! the check and the close makes the close fail instead of completing it.

use std::sync::Arc;
use std::time::Duration;

use shared::models::TableSession;
use shared::order::CloseReason;

use super::clock::Clock;
use super::error::{SessionError, SessionResult};
use super::registry::{ClosedSession, SessionRegistry};
use crate::core::BackgroundTasks;
use crate::core::Config;
use crate::db::repository::{order, table_session};

/// Sweep cadence and idle threshold
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    pub interval: Duration,
    pub inactivity_threshold: Duration,
}

impl ReaperConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.reaper_interval(),
            inactivity_threshold: config.inactivity_threshold(),
        }
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            inactivity_threshold: Duration::from_secs(30 * 60),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Active sessions looked at
    pub examined: usize,
    /// Session ids closed by this sweep
    pub closed: Vec<i64>,
    /// Sessions left open because work is pending or a concurrent writer won
    pub skipped: usize,
    /// Sessions whose check or close errored
    pub failed: usize,
}

#[derive(Clone, Debug)]
pub struct InactivityReaper {
    registry: SessionRegistry,
    clock: Arc<dyn Clock>,
    config: ReaperConfig,
}

impl InactivityReaper {
    pub fn new(registry: SessionRegistry, clock: Arc<dyn Clock>, config: ReaperConfig) -> Self {
        Self {
            registry,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Register the periodic sweep
    pub fn register(&self, tasks: &mut BackgroundTasks) {
        let reaper = self.clone();
        tasks.spawn_periodic("session_reaper", self.config.interval, move || {
            let reaper = reaper.clone();
            async move {
                reaper.sweep().await;
            }
        });
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            threshold_secs = self.config.inactivity_threshold.as_secs(),
            "Inactivity reaper registered"
        );
    }

    /// Decide whether one session should close, and why.
    ///
    /// `None` means keep it open (pending work, recent activity or already
    /// closed).
    pub async fn check_session(&self, session_id: i64) -> SessionResult<Option<CloseReason>> {
        let session = self.load(session_id).await?;
        self.decide(&session).await
    }

    /// Check one session and close it when it qualifies, without waiting for
    /// the next sweep.
    ///
    /// `None` when the session stays open, including when a concurrent order
    /// or close got there first.
    pub async fn reap_session(&self, session_id: i64) -> SessionResult<Option<ClosedSession>> {
        let session = self.load(session_id).await?;
        self.reap(&session).await
    }

    /// Run one pass over every active session.
    ///
    /// A failure on one session is logged and counted; the pass continues.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let sessions = match self.registry.all_active_sessions().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Reaper failed to load active sessions");
                report.failed += 1;
                return report;
            }
        };

        for session in sessions {
            report.examined += 1;
            match self.reap(&session).await {
                Ok(Some(_)) => report.closed.push(session.id),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(session_id = session.id, error = %e, "Reaper failed on session");
                    report.failed += 1;
                }
            }
        }

        if !report.closed.is_empty() || report.failed > 0 {
            tracing::info!(
                examined = report.examined,
                closed = report.closed.len(),
                skipped = report.skipped,
                failed = report.failed,
                "Session sweep finished"
            );
        }
        report
    }

    async fn load(&self, session_id: i64) -> SessionResult<TableSession> {
        table_session::find_by_id(self.registry.pool(), session_id)
            .await?
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    async fn decide(&self, session: &TableSession) -> SessionResult<Option<CloseReason>> {
        if !session.active {
            return Ok(None);
        }

        // newest first
        let orders = order::find_by_session(self.registry.pool(), session.id).await?;
        if orders.is_empty() {
            return Ok(Some(CloseReason::NoOrders));
        }
        if orders.iter().any(|o| !o.status.is_settled()) {
            return Ok(None);
        }

        let threshold = self.config.inactivity_threshold.as_millis() as i64;
        let cutoff = self.clock.now_millis() - threshold;
        let last_activity = orders.iter().map(|o| o.updated_at).max().unwrap_or_default();
        if last_activity < cutoff {
            Ok(Some(CloseReason::Inactivity))
        } else {
            Ok(None)
        }
    }

    async fn reap(&self, session: &TableSession) -> SessionResult<Option<ClosedSession>> {
        let Some(reason) = self.decide(session).await? else {
            return Ok(None);
        };
        match self
            .registry
            .close_session(session.restaurant_id, session.id, reason)
            .await
        {
            Ok(closed) => Ok(Some(closed)),
            // 巡检与人工操作 / 新下单并发
            Err(SessionError::HasPendingOrders(_)) | Err(SessionError::SessionClosed(_)) => {
                tracing::debug!(session_id = session.id, "Session changed before close, kept");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::message::{FanoutChannel, RoomHub};
    use crate::sessions::ManualClock;
    use shared::models::{DiningTableCreate, RestaurantCreate, SessionLookup};

    #[tokio::test]
    async fn test_zero_order_session_closed_on_first_sweep() {
        let db = DbService::in_memory().await.unwrap();
        let restaurant = crate::db::repository::restaurant::create(
            &db.pool,
            RestaurantCreate {
                name: "R".into(),
                tax_rate: 0.0,
            },
        )
        .await
        .unwrap();
        let clock = ManualClock::starting_now();
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let registry = SessionRegistry::new(
            db.pool.clone(),
            FanoutChannel::new(Arc::new(RoomHub::default())),
            clock.clone(),
        );
        let table = registry
            .create_table(
                restaurant.id,
                DiningTableCreate {
                    number: "9".into(),
                    capacity: None,
                },
            )
            .await
            .unwrap();
        let session = registry
            .resolve_or_create_session(restaurant.id, SessionLookup::Table(table.id))
            .await
            .unwrap()
            .session;

        let reaper = InactivityReaper::new(registry.clone(), clock, ReaperConfig::default());
        assert_eq!(
            reaper.check_session(session.id).await.unwrap(),
            Some(CloseReason::NoOrders)
        );

        let report = reaper.sweep().await;
        assert_eq!(report.examined, 1);
        assert_eq!(report.closed, vec![session.id]);

        let session = registry.find_session(restaurant.id, session.id).await.unwrap();
        assert!(!session.active);
        assert_eq!(session.close_reason, Some(CloseReason::NoOrders));
        assert!(registry.find_table(restaurant.id, table.id).await.unwrap().available);

        // closed sessions are not looked at again
        assert_eq!(reaper.sweep().await, SweepReport::default());
    }

    #[test]
    fn test_default_config() {
        let config = ReaperConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.inactivity_threshold, Duration::from_secs(1800));
    }
}
