//! Dining Table Repository

use super::{RepoError, RepoResult};
use shared::models::{DiningTable, DiningTableCreate};
use sqlx::{SqliteExecutor, SqlitePool};

const COLUMNS: &str = "id, restaurant_id, number, capacity, available, qr_token, created_at";

/// Default seats when the payload omits capacity
const DEFAULT_CAPACITY: i32 = 4;

pub async fn find_by_id<'e, E>(
    executor: E,
    restaurant_id: i64,
    table_id: i64,
) -> RepoResult<Option<DiningTable>>
where
    E: SqliteExecutor<'e>,
{
    let table = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables WHERE id = ? AND restaurant_id = ?"
    ))
    .bind(table_id)
    .bind(restaurant_id)
    .fetch_optional(executor)
    .await?;
    Ok(table)
}

pub async fn find_by_qr<'e, E>(executor: E, qr_token: &str) -> RepoResult<Option<DiningTable>>
where
    E: SqliteExecutor<'e>,
{
    let table = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables WHERE qr_token = ?"
    ))
    .bind(qr_token)
    .fetch_optional(executor)
    .await?;
    Ok(table)
}

pub async fn find_all(pool: &SqlitePool, restaurant_id: i64) -> RepoResult<Vec<DiningTable>> {
    let tables = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables WHERE restaurant_id = ? ORDER BY number"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

pub async fn create(
    pool: &SqlitePool,
    restaurant_id: i64,
    data: DiningTableCreate,
) -> RepoResult<DiningTable> {
    let number = data.number.trim().to_string();
    if number.is_empty() {
        return Err(RepoError::Validation("Table number must not be empty".into()));
    }
    let capacity = data.capacity.unwrap_or(DEFAULT_CAPACITY);
    if capacity <= 0 {
        return Err(RepoError::Validation(format!(
            "capacity must be positive, got {capacity}"
        )));
    }

    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO dining_tables (id, restaurant_id, number, capacity, available, qr_token, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
    )
    .bind(id)
    .bind(restaurant_id)
    .bind(&number)
    .bind(capacity)
    .bind(shared::util::qr_token())
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| match RepoError::from(e) {
        RepoError::Duplicate(_) => {
            RepoError::Duplicate(format!("Table '{number}' already exists"))
        }
        other => other,
    })?;

    find_by_id(pool, restaurant_id, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create dining table".into()))
}

pub async fn set_available<'e, E>(executor: E, table_id: i64, available: bool) -> RepoResult<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE dining_tables SET available = ? WHERE id = ?")
        .bind(available)
        .bind(table_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Mark a table free; `false` when it does not belong to the restaurant
pub async fn release<'e, E>(executor: E, restaurant_id: i64, table_id: i64) -> RepoResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("UPDATE dining_tables SET available = 1 WHERE id = ? AND restaurant_id = ?")
        .bind(table_id)
        .bind(restaurant_id)
        .execute(executor)
        .await?;
    Ok(rows.rows_affected() > 0)
}

/// Delete a table unless it has an active session.
///
/// Check and delete are one statement. Closed sessions cascade; orders keep
/// a null table reference.
pub async fn delete_if_idle<'e, E>(executor: E, restaurant_id: i64, table_id: i64) -> RepoResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "DELETE FROM dining_tables WHERE id = ?1 AND restaurant_id = ?2
         AND NOT EXISTS (SELECT 1 FROM table_sessions WHERE table_id = ?1 AND active = 1)",
    )
    .bind(table_id)
    .bind(restaurant_id)
    .execute(executor)
    .await?;
    Ok(rows.rows_affected() > 0)
}
