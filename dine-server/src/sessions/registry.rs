//! Table / session registry
//!
//! Keeps two rules:
//! - a table has at most one active session (partial unique index plus a
//!   conditional insert, so concurrent scans converge on one row)
//! - `dining_tables.available` is `false` exactly while an active session
//!   references the table (both are written in the same transaction)
//!
//! Events are emitted after commit and never fail the operation.

use std::sync::Arc;

use shared::message::{FanoutEvent, OrderUpdatedPayload, SessionClosedPayload, SessionPayload, TablePayload};
use shared::models::{DiningTable, DiningTableCreate, Order, SessionLookup, TableSession};
use shared::order::{CloseReason, OrderTransition, administrative_close};
use sqlx::{Sqlite, SqlitePool, Transaction};

use super::clock::Clock;
use super::error::{SessionError, SessionResult};
use crate::db::repository::table_session::NewSession;
use crate::db::repository::{RepoError, dining_table, order, table_session};
use crate::message::FanoutChannel;

/// Attempts before giving up on a table whose session keeps flipping
const RESOLVE_ATTEMPTS: usize = 3;

/// Session returned by a lookup
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: TableSession,
    pub table: DiningTable,
    /// `true` when this call opened the session
    pub created: bool,
}

/// Result of closing one session
#[derive(Debug, Clone)]
pub struct ClosedSession {
    pub session: TableSession,
    pub table: DiningTable,
    /// Orders forced to `COMPLETED` by the administrative override
    pub forced: Vec<(Order, OrderTransition)>,
}

#[derive(Clone, Debug)]
pub struct SessionRegistry {
    pool: SqlitePool,
    fanout: FanoutChannel,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    pub fn new(pool: SqlitePool, fanout: FanoutChannel, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            fanout,
            clock,
        }
    }

    // ========================================================================
    // Resolve
    // ========================================================================

    /// Find the session for a code, or the active session of a table,
    /// opening one when the table has none.
    ///
    /// A code lookup returns the session even when it is closed; callers
    /// that need an active one check [`TableSession::active`].
    pub async fn resolve_or_create_session(
        &self,
        restaurant_id: i64,
        lookup: SessionLookup,
    ) -> SessionResult<ResolvedSession> {
        match lookup {
            SessionLookup::Code(code) => {
                let session = table_session::find_by_code(&self.pool, restaurant_id, &code)
                    .await?
                    .ok_or_else(|| SessionError::SessionNotFound(code.clone()))?;
                let table = dining_table::find_by_id(&self.pool, restaurant_id, session.table_id)
                    .await?
                    .ok_or_else(|| SessionError::TableNotFound(session.table_id.to_string()))?;
                Ok(ResolvedSession {
                    session,
                    table,
                    created: false,
                })
            }
            SessionLookup::Table(table_id) => {
                let table = dining_table::find_by_id(&self.pool, restaurant_id, table_id)
                    .await?
                    .ok_or_else(|| SessionError::TableNotFound(table_id.to_string()))?;
                self.resolve_for_table(table).await
            }
        }
    }

    /// Scan entry point: the QR token identifies the table
    pub async fn resolve_by_qr(&self, qr_token: &str) -> SessionResult<ResolvedSession> {
        let table = dining_table::find_by_qr(&self.pool, qr_token)
            .await?
            .ok_or_else(|| SessionError::TableNotFound(format!("qr:{qr_token}")))?;
        self.resolve_for_table(table).await
    }

    async fn resolve_for_table(&self, table: DiningTable) -> SessionResult<ResolvedSession> {
        for attempt in 1..=RESOLVE_ATTEMPTS {
            if let Some(session) = table_session::find_active_for_table(&self.pool, table.id).await? {
                return Ok(ResolvedSession {
                    session,
                    table,
                    created: false,
                });
            }

            if let Some(resolved) = self.try_open_session(&table).await? {
                self.fanout
                    .emit_all(
                        table.restaurant_id,
                        [
                            FanoutEvent::SessionCreated(SessionPayload {
                                session_id: resolved.session.id,
                                session_code: resolved.session.session_code.clone(),
                                table_id: table.id,
                                table_number: table.number.clone(),
                            }),
                            FanoutEvent::TableUpdated(table_payload(&resolved.table)),
                        ],
                    )
                    .await;
                return Ok(resolved);
            }

            // 另一个请求抢先开台，下一轮读取它的会话
            tracing::debug!(table_id = table.id, attempt, "Lost session race, re-reading");
        }

        Err(SessionError::Repo(RepoError::Database(format!(
            "Could not settle an active session for table {}",
            table.id
        ))))
    }

    /// Insert-first so the transaction takes the write lock on its first
    /// statement; `None` when another session won the table.
    async fn try_open_session(&self, table: &DiningTable) -> SessionResult<Option<ResolvedSession>> {
        let mut new = NewSession {
            id: shared::util::snowflake_id(),
            table_id: table.id,
            restaurant_id: table.restaurant_id,
            session_code: shared::util::session_code(),
            customer_name: None,
            created_at: self.clock.now_millis(),
        };

        let mut tx = self.pool.begin().await?;
        if !table_session::insert_if_vacant_with_fresh_id(&mut tx, &mut new, shared::util::snowflake_id)
            .await?
        {
            tx.rollback().await?;
            return Ok(None);
        }
        dining_table::set_available(&mut *tx, table.id, false).await?;
        let session = table_session::find_by_id(&mut *tx, new.id)
            .await?
            .ok_or_else(|| RepoError::Database("Failed to create session".into()))?;
        tx.commit().await?;

        tracing::info!(
            restaurant_id = table.restaurant_id,
            table_id = table.id,
            session_id = session.id,
            "Table session opened"
        );

        let mut table = table.clone();
        table.available = false;
        Ok(Some(ResolvedSession {
            session,
            table,
            created: true,
        }))
    }

    // ========================================================================
    // Close
    // ========================================================================

    /// Close a session and free its table in one transaction.
    ///
    /// Manual closes force every unsettled order to `COMPLETED` through the
    /// administrative transition; reaper closes refuse sessions that still
    /// have pending work.
    pub async fn close_session(
        &self,
        restaurant_id: i64,
        session_id: i64,
        reason: CloseReason,
    ) -> SessionResult<ClosedSession> {
        let now = self.clock.now_millis();
        let mut tx = self.pool.begin().await?;
        let closed = close_in_tx(&mut tx, restaurant_id, session_id, reason, now).await?;
        tx.commit().await?;

        log_close(&closed, reason);
        self.emit_closed(&closed, reason).await;
        Ok(closed)
    }

    /// Force-close every active session on a table and mark it available
    pub async fn lift_table(
        &self,
        restaurant_id: i64,
        table_id: i64,
    ) -> SessionResult<Vec<ClosedSession>> {
        let now = self.clock.now_millis();
        let mut tx = self.pool.begin().await?;

        // write first: takes the lock and proves the table exists
        if !dining_table::release(&mut *tx, restaurant_id, table_id).await? {
            return Err(SessionError::TableNotFound(table_id.to_string()));
        }

        // at most one by the partial unique index
        let active = table_session::find_active_for_table(&mut *tx, table_id).await?;

        let mut closed = Vec::with_capacity(1);
        for session in active {
            closed.push(
                close_in_tx(&mut tx, restaurant_id, session.id, CloseReason::TableLifted, now).await?,
            );
        }
        let table = dining_table::find_by_id(&mut *tx, restaurant_id, table_id)
            .await?
            .ok_or_else(|| SessionError::TableNotFound(table_id.to_string()))?;
        tx.commit().await?;

        tracing::warn!(
            restaurant_id,
            table_id,
            sessions = closed.len(),
            "Table lifted, active sessions force-closed"
        );

        for c in &closed {
            log_close(c, CloseReason::TableLifted);
            self.emit_closed(c, CloseReason::TableLifted).await;
        }
        if closed.is_empty() {
            self.fanout
                .emit(restaurant_id, FanoutEvent::TableUpdated(table_payload(&table)))
                .await;
        }
        Ok(closed)
    }

    async fn emit_closed(&self, closed: &ClosedSession, reason: CloseReason) {
        let restaurant_id = closed.session.restaurant_id;
        let mut events: Vec<FanoutEvent> = closed
            .forced
            .iter()
            .map(|(order, transition)| {
                FanoutEvent::OrderUpdated(OrderUpdatedPayload {
                    order_id: order.id,
                    order_number: order.order_number.clone(),
                    status: transition.to(),
                    previous_status: transition.from(),
                    table_number: Some(closed.table.number.clone()),
                })
            })
            .collect();
        events.push(FanoutEvent::SessionClosed(SessionClosedPayload {
            session_id: closed.session.id,
            session_code: closed.session.session_code.clone(),
            table_id: closed.table.id,
            table_number: closed.table.number.clone(),
            reason,
        }));
        events.push(FanoutEvent::TableUpdated(table_payload(&closed.table)));
        self.fanout.emit_all(restaurant_id, events).await;
    }

    // ========================================================================
    // Tables
    // ========================================================================

    pub async fn create_table(
        &self,
        restaurant_id: i64,
        data: DiningTableCreate,
    ) -> SessionResult<DiningTable> {
        let number = data.number.clone();
        let table = dining_table::create(&self.pool, restaurant_id, data)
            .await
            .map_err(|e| match e {
                RepoError::Duplicate(_) => SessionError::TableNumberExists(number),
                other => other.into(),
            })?;
        tracing::info!(restaurant_id, table_id = table.id, number = %table.number, "Table created");
        self.fanout
            .emit(restaurant_id, FanoutEvent::TableCreated(table_payload(&table)))
            .await;
        Ok(table)
    }

    /// Delete a table that has no active session.
    ///
    /// Closed sessions go with it; historical orders keep a null table id.
    pub async fn delete_table(&self, restaurant_id: i64, table_id: i64) -> SessionResult<()> {
        let table = self.find_table(restaurant_id, table_id).await?;

        let deleted = dining_table::delete_if_idle(&self.pool, restaurant_id, table_id).await?;

        if !deleted {
            if table_session::count_active_for_table(&self.pool, table_id).await? > 0 {
                return Err(SessionError::TableHasActiveSession(table_id));
            }
            return Err(SessionError::TableNotFound(table_id.to_string()));
        }

        tracing::info!(restaurant_id, table_id, "Table deleted");
        self.fanout
            .emit(restaurant_id, FanoutEvent::TableDeleted(table_payload(&table)))
            .await;
        Ok(())
    }

    pub async fn find_table(&self, restaurant_id: i64, table_id: i64) -> SessionResult<DiningTable> {
        dining_table::find_by_id(&self.pool, restaurant_id, table_id)
            .await?
            .ok_or_else(|| SessionError::TableNotFound(table_id.to_string()))
    }

    pub async fn list_tables(&self, restaurant_id: i64) -> SessionResult<Vec<DiningTable>> {
        Ok(dining_table::find_all(&self.pool, restaurant_id).await?)
    }

    // ========================================================================
    // Session reads
    // ========================================================================

    pub async fn find_session(&self, restaurant_id: i64, session_id: i64) -> SessionResult<TableSession> {
        table_session::find_by_id(&self.pool, session_id)
            .await?
            .filter(|s| s.restaurant_id == restaurant_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))
    }

    pub async fn session_by_code(&self, restaurant_id: i64, code: &str) -> SessionResult<TableSession> {
        table_session::find_by_code(&self.pool, restaurant_id, code)
            .await?
            .ok_or_else(|| SessionError::SessionNotFound(code.to_string()))
    }

    pub async fn active_sessions(&self, restaurant_id: i64) -> SessionResult<Vec<TableSession>> {
        Ok(table_session::find_active(&self.pool, Some(restaurant_id)).await?)
    }

    /// Active sessions across all restaurants (reaper)
    pub(crate) async fn all_active_sessions(&self) -> SessionResult<Vec<TableSession>> {
        Ok(table_session::find_active(&self.pool, None).await?)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Close one session inside `tx`
async fn close_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    restaurant_id: i64,
    session_id: i64,
    reason: CloseReason,
    now: i64,
) -> SessionResult<ClosedSession> {
    if !table_session::close(&mut **tx, session_id, reason, now).await? {
        return match table_session::find_by_id(&mut **tx, session_id).await? {
            Some(s) if s.restaurant_id == restaurant_id => Err(SessionError::SessionClosed(s.session_code)),
            _ => Err(SessionError::SessionNotFound(session_id.to_string())),
        };
    }

    let session = table_session::find_by_id(&mut **tx, session_id)
        .await?
        .filter(|s| s.restaurant_id == restaurant_id)
        .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

    let unsettled: Vec<Order> = order::find_by_session(&mut **tx, session_id)
        .await?
        .into_iter()
        .filter(|o| !o.status.is_settled())
        .collect();

    if !reason.is_administrative() && !unsettled.is_empty() {
        return Err(SessionError::HasPendingOrders(session_id));
    }

    let mut forced = Vec::with_capacity(unsettled.len());
    for mut o in unsettled {
        let Some(transition) = administrative_close(o.status) else {
            continue;
        };
        if order::apply_transition(tx, o.id, &transition, now).await? {
            o.status = transition.to();
            o.updated_at = now;
            forced.push((o, transition));
        }
    }

    dining_table::set_available(&mut **tx, session.table_id, true).await?;
    let table = dining_table::find_by_id(&mut **tx, restaurant_id, session.table_id)
        .await?
        .ok_or_else(|| SessionError::TableNotFound(session.table_id.to_string()))?;

    Ok(ClosedSession {
        session,
        table,
        forced,
    })
}

fn log_close(closed: &ClosedSession, reason: CloseReason) {
    if closed.forced.is_empty() {
        tracing::info!(
            session_id = closed.session.id,
            table_id = closed.table.id,
            reason = ?reason,
            "Table session closed"
        );
    } else {
        let forced: Vec<i64> = closed.forced.iter().map(|(o, _)| o.id).collect();
        tracing::warn!(
            session_id = closed.session.id,
            table_id = closed.table.id,
            reason = ?reason,
            forced_orders = ?forced,
            "Table session closed, unsettled orders forced to COMPLETED"
        );
    }
}

fn table_payload(table: &DiningTable) -> TablePayload {
    TablePayload {
        table_id: table.id,
        table_number: table.number.clone(),
        available: table.available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::message::RoomHub;
    use crate::sessions::clock::ManualClock;
    use shared::models::RestaurantCreate;

    async fn setup() -> (SessionRegistry, i64) {
        let db = DbService::in_memory().await.unwrap();
        let restaurant = crate::db::repository::restaurant::create(
            &db.pool,
            RestaurantCreate {
                name: "Test".into(),
                tax_rate: 0.0,
            },
        )
        .await
        .unwrap();
        let fanout = FanoutChannel::new(Arc::new(RoomHub::default()));
        let registry = SessionRegistry::new(db.pool, fanout, Arc::new(ManualClock::starting_now()));
        (registry, restaurant.id)
    }

    fn table(number: &str) -> DiningTableCreate {
        DiningTableCreate {
            number: number.into(),
            capacity: Some(2),
        }
    }

    #[tokio::test]
    async fn test_table_lookup_is_idempotent() {
        let (registry, rid) = setup().await;
        let t = registry.create_table(rid, table("1")).await.unwrap();
        assert!(t.available);

        let first = registry
            .resolve_or_create_session(rid, SessionLookup::Table(t.id))
            .await
            .unwrap();
        assert!(first.created);
        assert!(!first.table.available);

        let second = registry
            .resolve_or_create_session(rid, SessionLookup::Table(t.id))
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(first.session.id, second.session.id);

        let by_code = registry
            .resolve_or_create_session(rid, SessionLookup::Code(first.session.session_code.clone()))
            .await
            .unwrap();
        assert_eq!(by_code.session.id, first.session.id);
    }

    #[tokio::test]
    async fn test_unknown_code_and_table() {
        let (registry, rid) = setup().await;
        let err = registry
            .resolve_or_create_session(rid, SessionLookup::Code("NOPE2345".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionNotFound(_)));

        let err = registry
            .resolve_or_create_session(rid, SessionLookup::Table(77))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_table_number() {
        let (registry, rid) = setup().await;
        registry.create_table(rid, table("A1")).await.unwrap();
        let err = registry.create_table(rid, table("A1")).await.unwrap_err();
        assert!(matches!(err, SessionError::TableNumberExists(n) if n == "A1"));
    }

    #[tokio::test]
    async fn test_close_twice_reports_closed() {
        let (registry, rid) = setup().await;
        let t = registry.create_table(rid, table("2")).await.unwrap();
        let s = registry
            .resolve_or_create_session(rid, SessionLookup::Table(t.id))
            .await
            .unwrap();

        let closed = registry
            .close_session(rid, s.session.id, CloseReason::Manual)
            .await
            .unwrap();
        assert!(!closed.session.active);
        assert_eq!(closed.session.close_reason, Some(CloseReason::Manual));
        assert!(closed.table.available);

        let err = registry
            .close_session(rid, s.session.id, CloseReason::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionClosed(_)));
    }

    #[tokio::test]
    async fn test_qr_scan_opens_session() {
        let (registry, rid) = setup().await;
        let t = registry.create_table(rid, table("3")).await.unwrap();
        let resolved = registry.resolve_by_qr(&t.qr_token).await.unwrap();
        assert_eq!(resolved.session.table_id, t.id);
        assert!(resolved.created);

        let err = registry.resolve_by_qr("missing").await.unwrap_err();
        assert!(matches!(err, SessionError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn test_lift_table_without_sessions() {
        let (registry, rid) = setup().await;
        let t = registry.create_table(rid, table("4")).await.unwrap();
        assert!(registry.lift_table(rid, t.id).await.unwrap().is_empty());
        assert!(registry.find_table(rid, t.id).await.unwrap().available);

        let err = registry.lift_table(rid, 12345).await.unwrap_err();
        assert!(matches!(err, SessionError::TableNotFound(_)));
    }
}
