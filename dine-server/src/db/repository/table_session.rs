//! Table Session Repository

use super::RepoResult;
use shared::models::TableSession;
use shared::order::CloseReason;
use sqlx::{SqliteConnection, SqliteExecutor};

const COLUMNS: &str = "id, table_id, restaurant_id, session_code, active, customer_name, created_at, closed_at, close_reason";

/// Row to insert for a new active session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: i64,
    pub table_id: i64,
    pub restaurant_id: i64,
    pub session_code: String,
    pub customer_name: Option<String>,
    pub created_at: i64,
}

pub async fn find_by_id<'e, E>(executor: E, session_id: i64) -> RepoResult<Option<TableSession>>
where
    E: SqliteExecutor<'e>,
{
    let session = sqlx::query_as::<_, TableSession>(&format!(
        "SELECT {COLUMNS} FROM table_sessions WHERE id = ?"
    ))
    .bind(session_id)
    .fetch_optional(executor)
    .await?;
    Ok(session)
}

pub async fn find_by_code<'e, E>(
    executor: E,
    restaurant_id: i64,
    session_code: &str,
) -> RepoResult<Option<TableSession>>
where
    E: SqliteExecutor<'e>,
{
    let session = sqlx::query_as::<_, TableSession>(&format!(
        "SELECT {COLUMNS} FROM table_sessions WHERE session_code = ? AND restaurant_id = ?"
    ))
    .bind(session_code)
    .bind(restaurant_id)
    .fetch_optional(executor)
    .await?;
    Ok(session)
}

pub async fn find_active_for_table<'e, E>(
    executor: E,
    table_id: i64,
) -> RepoResult<Option<TableSession>>
where
    E: SqliteExecutor<'e>,
{
    let session = sqlx::query_as::<_, TableSession>(&format!(
        "SELECT {COLUMNS} FROM table_sessions WHERE table_id = ? AND active = 1"
    ))
    .bind(table_id)
    .fetch_optional(executor)
    .await?;
    Ok(session)
}

/// Active sessions, optionally restricted to one restaurant
pub async fn find_active<'e, E>(
    executor: E,
    restaurant_id: Option<i64>,
) -> RepoResult<Vec<TableSession>>
where
    E: SqliteExecutor<'e>,
{
    let sessions = sqlx::query_as::<_, TableSession>(&format!(
        "SELECT {COLUMNS} FROM table_sessions WHERE active = 1 AND (?1 IS NULL OR restaurant_id = ?1) ORDER BY created_at"
    ))
    .bind(restaurant_id)
    .fetch_all(executor)
    .await?;
    Ok(sessions)
}

/// Insert an active session unless the table already has one.
///
/// Returns `false` when the one-active-per-table index rejected the row.
pub async fn insert_if_vacant<'e, E>(executor: E, session: &NewSession) -> RepoResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "INSERT INTO table_sessions (id, table_id, restaurant_id, session_code, active, customer_name, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)
         ON CONFLICT (table_id) WHERE active = 1 DO NOTHING",
    )
    .bind(session.id)
    .bind(session.table_id)
    .bind(session.restaurant_id)
    .bind(&session.session_code)
    .bind(&session.customer_name)
    .bind(session.created_at)
    .execute(executor)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// [`insert_if_vacant`], retried once under a new id when the generated one
/// is taken. The table conflict still reports `false`.
pub async fn insert_if_vacant_with_fresh_id(
    conn: &mut SqliteConnection,
    session: &mut NewSession,
    mut fresh_id: impl FnMut() -> i64,
) -> RepoResult<bool> {
    match insert_if_vacant(&mut *conn, session).await {
        Err(e) if e.is_id_conflict("table_sessions") => {
            let taken = session.id;
            session.id = fresh_id();
            tracing::debug!(taken, retry_id = session.id, "Session id collision, retrying");
            insert_if_vacant(&mut *conn, session).await
        }
        other => other,
    }
}

/// Mark a session inactive; `false` if it was already closed
pub async fn close<'e, E>(
    executor: E,
    session_id: i64,
    reason: CloseReason,
    closed_at: i64,
) -> RepoResult<bool>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "UPDATE table_sessions SET active = 0, closed_at = ?1, close_reason = ?2 WHERE id = ?3 AND active = 1",
    )
    .bind(closed_at)
    .bind(reason)
    .bind(session_id)
    .execute(executor)
    .await?;
    Ok(rows.rows_affected() > 0)
}

pub async fn count_active_for_table<'e, E>(executor: E, table_id: i64) -> RepoResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM table_sessions WHERE table_id = ? AND active = 1")
            .bind(table_id)
            .fetch_one(executor)
            .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::{dining_table, restaurant};
    use shared::models::{DiningTableCreate, RestaurantCreate};

    fn new_session(id: i64, table_id: i64, restaurant_id: i64, code: &str) -> NewSession {
        NewSession {
            id,
            table_id,
            restaurant_id,
            session_code: code.into(),
            customer_name: None,
            created_at: 1,
        }
    }

    #[tokio::test]
    async fn test_taken_session_id_is_regenerated() {
        let db = DbService::in_memory().await.unwrap();
        let r = restaurant::create(
            &db.pool,
            RestaurantCreate {
                name: "R".into(),
                tax_rate: 0.0,
            },
        )
        .await
        .unwrap();
        let mut tables = Vec::new();
        for number in ["1", "2"] {
            let data = DiningTableCreate {
                number: number.into(),
                capacity: None,
            };
            tables.push(dining_table::create(&db.pool, r.id, data).await.unwrap());
        }

        let mut conn = db.pool.acquire().await.unwrap();
        let mut first = new_session(7, tables[0].id, r.id, "AAAAAAAA");
        assert!(insert_if_vacant_with_fresh_id(&mut conn, &mut first, || 100).await.unwrap());
        assert_eq!(first.id, 7);

        // same table: the vacancy check wins, no retry
        let mut again = new_session(9, tables[0].id, r.id, "BBBBBBBB");
        assert!(!insert_if_vacant_with_fresh_id(&mut conn, &mut again, || 100).await.unwrap());
        assert_eq!(again.id, 9);

        // other table, clashing id
        let mut clash = new_session(7, tables[1].id, r.id, "CCCCCCCC");
        assert!(insert_if_vacant_with_fresh_id(&mut conn, &mut clash, || 8).await.unwrap());
        assert_eq!(clash.id, 8);
        drop(conn);

        let stored = find_by_id(&db.pool, 8).await.unwrap().unwrap();
        assert_eq!(stored.table_id, tables[1].id);
        assert!(stored.active);
    }
}
