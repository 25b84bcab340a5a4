//! redb 离线下单队列
//!
//! Orders taken while the server is unreachable are stored here and replayed
//! later. Every entry carries an explicit [`SyncState`] and an attempt count;
//! nothing is dropped silently.
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `offline_orders` | queue id | JSON [`QueuedOrder`] |
//! | `queue_sequence` | `"seq"` | last issued id |

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
};
use serde::{Deserialize, Serialize};
use shared::models::CreateOrderRequest;
use shared::util::now_millis;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

const ORDERS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("offline_orders");
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("queue_sequence");
const SEQUENCE_KEY: &str = "seq";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    PendingSync,
    Synced,
    /// Gave up after too many attempts; see [`OfflineQueue::retry_failed`]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOrder {
    pub id: u64,
    pub request: CreateOrderRequest,
    pub state: SyncState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Outcome of one [`OfflineQueue::sync_pending`] pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub synced: usize,
    /// Submissions that failed this pass (still pending or now `Failed`)
    pub errors: usize,
    /// Entries that reached `Failed` this pass
    pub gave_up: usize,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queued order not found: {0}")]
    NotFound(u64),
}

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Clone)]
pub struct OfflineQueue {
    db: Arc<Database>,
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue").finish_non_exhaustive()
    }
}

impl OfflineQueue {
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        Self::init(Database::create(path)?)
    }

    pub fn open_in_memory() -> QueueResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> QueueResult<Self> {
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(ORDERS_TABLE)?;
            let mut seq = txn.open_table(SEQUENCE_TABLE)?;
            if seq.get(SEQUENCE_KEY)?.is_none() {
                seq.insert(SEQUENCE_KEY, 0u64)?;
            }
        }
        txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Store an order for later submission
    pub fn enqueue(&self, request: CreateOrderRequest) -> QueueResult<QueuedOrder> {
        let txn = self.db.begin_write()?;
        let entry = {
            let mut seq = txn.open_table(SEQUENCE_TABLE)?;
            let id = seq.get(SEQUENCE_KEY)?.map(|g| g.value()).unwrap_or(0) + 1;
            seq.insert(SEQUENCE_KEY, id)?;

            let now = now_millis();
            let entry = QueuedOrder {
                id,
                request,
                state: SyncState::PendingSync,
                attempts: 0,
                last_error: None,
                created_at: now,
                updated_at: now,
            };
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let value = serde_json::to_vec(&entry)?;
            table.insert(id, value.as_slice())?;
            entry
        };
        txn.commit()?;
        tracing::debug!(queue_id = entry.id, "Order queued offline");
        Ok(entry)
    }

    pub fn get(&self, id: u64) -> QueueResult<Option<QueuedOrder>> {
        let read = self.db.begin_read()?;
        let table = read.open_table(ORDERS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All entries in enqueue order
    pub fn all(&self) -> QueueResult<Vec<QueuedOrder>> {
        let read = self.db.begin_read()?;
        let table = read.open_table(ORDERS_TABLE)?;
        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    /// Entries waiting for submission, oldest first
    pub fn pending(&self) -> QueueResult<Vec<QueuedOrder>> {
        self.in_state(SyncState::PendingSync)
    }

    pub fn failed(&self) -> QueueResult<Vec<QueuedOrder>> {
        self.in_state(SyncState::Failed)
    }

    fn in_state(&self, state: SyncState) -> QueueResult<Vec<QueuedOrder>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|e| e.state == state)
            .collect())
    }

    pub fn len(&self) -> QueueResult<u64> {
        let read = self.db.begin_read()?;
        let table = read.open_table(ORDERS_TABLE)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn mark_synced(&self, id: u64) -> QueueResult<QueuedOrder> {
        self.update(id, |entry| {
            entry.state = SyncState::Synced;
            entry.attempts += 1;
            entry.last_error = None;
        })
    }

    /// Record a failed submission; the entry turns `Failed` once it has used
    /// `max_attempts`
    pub fn mark_failed(&self, id: u64, error: &str, max_attempts: u32) -> QueueResult<QueuedOrder> {
        self.update(id, |entry| {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
            if entry.attempts >= max_attempts {
                entry.state = SyncState::Failed;
            }
        })
    }

    /// Put every `Failed` entry back to `PendingSync` with a fresh attempt count
    pub fn retry_failed(&self) -> QueueResult<usize> {
        let txn = self.db.begin_write()?;
        let count = {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let mut failed = Vec::new();
            for result in table.iter()? {
                let (_, value) = result?;
                let entry: QueuedOrder = serde_json::from_slice(value.value())?;
                if entry.state == SyncState::Failed {
                    failed.push(entry);
                }
            }
            let now = now_millis();
            for mut entry in failed.iter().cloned() {
                entry.state = SyncState::PendingSync;
                entry.attempts = 0;
                entry.updated_at = now;
                let value = serde_json::to_vec(&entry)?;
                table.insert(entry.id, value.as_slice())?;
            }
            failed.len()
        };
        txn.commit()?;
        Ok(count)
    }

    /// Drop entries that reached the server
    pub fn purge_synced(&self) -> QueueResult<usize> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let mut ids = Vec::new();
            for result in table.iter()? {
                let (key, value) = result?;
                let entry: QueuedOrder = serde_json::from_slice(value.value())?;
                if entry.state == SyncState::Synced {
                    ids.push(key.value());
                }
            }
            for id in &ids {
                table.remove(*id)?;
            }
            ids.len()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn update(&self, id: u64, apply: impl FnOnce(&mut QueuedOrder)) -> QueueResult<QueuedOrder> {
        let txn = self.db.begin_write()?;
        let entry = {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let current: Option<QueuedOrder> = match table.get(id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            let mut entry = current.ok_or(QueueError::NotFound(id))?;
            apply(&mut entry);
            entry.updated_at = now_millis();
            let value = serde_json::to_vec(&entry)?;
            table.insert(id, value.as_slice())?;
            entry
        };
        txn.commit()?;
        Ok(entry)
    }

    /// Submit every pending entry in order
    ///
    /// `submit` returns `Err(reason)` when the server refused or could not be
    /// reached; the entry stays pending until `max_attempts` is used up.
    pub async fn sync_pending<F, Fut>(&self, mut submit: F, max_attempts: u32) -> QueueResult<SyncReport>
    where
        F: FnMut(QueuedOrder) -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let mut report = SyncReport::default();
        for entry in self.pending()? {
            let id = entry.id;
            match submit(entry).await {
                Ok(()) => {
                    self.mark_synced(id)?;
                    report.synced += 1;
                }
                Err(reason) => {
                    let updated = self.mark_failed(id, &reason, max_attempts)?;
                    report.errors += 1;
                    if updated.state == SyncState::Failed {
                        report.gave_up += 1;
                        tracing::warn!(queue_id = id, attempts = updated.attempts, error = %reason, "Offline order gave up");
                    } else {
                        tracing::debug!(queue_id = id, attempts = updated.attempts, error = %reason, "Offline order sync failed");
                    }
                }
            }
        }
        if report.synced > 0 || report.errors > 0 {
            tracing::info!(synced = report.synced, errors = report.errors, gave_up = report.gave_up, "Offline queue sync finished");
        }
        Ok(report)
    }
}
