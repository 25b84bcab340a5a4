//! Order Repository

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderItem};
use shared::order::{OrderStatus, OrderTransition};
use sqlx::{Sqlite, SqliteExecutor, SqlitePool, Transaction};

const COLUMNS: &str = "id, restaurant_id, order_number, table_id, session_id, customer_name, order_type, status, subtotal, tax, tip, discount, total, notes, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price, note";

/// Statuses that still carry kitchen or service work
const UNSETTLED: &str = "('PENDING', 'ACCEPTED', 'PREPARING', 'READY', 'DELIVERED')";

/// Insert an order with its items. Runs inside the creation transaction.
///
/// Item ids are assigned by SQLite so they follow cart order; they are
/// written back into `order.items`.
pub async fn insert(tx: &mut Transaction<'_, Sqlite>, order: &mut Order) -> RepoResult<()> {
    sqlx::query(
        "INSERT INTO orders (id, restaurant_id, order_number, table_id, session_id, customer_name, order_type, status, subtotal, tax, tip, discount, total, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
    )
    .bind(order.id)
    .bind(order.restaurant_id)
    .bind(&order.order_number)
    .bind(order.table_id)
    .bind(order.session_id)
    .bind(&order.customer_name)
    .bind(order.order_type)
    .bind(order.status)
    .bind(order.subtotal)
    .bind(order.tax)
    .bind(order.tip)
    .bind(order.discount)
    .bind(order.total)
    .bind(&order.notes)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await?;

    for item in &mut order.items {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
        )
        .bind(order.id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(&item.note)
        .fetch_one(&mut **tx)
        .await?;
        item.id = id;
        item.order_id = order.id;
    }
    Ok(())
}

/// [`insert`], retried once under a new id when the generated one is taken
pub async fn insert_with_fresh_id(
    tx: &mut Transaction<'_, Sqlite>,
    order: &mut Order,
    mut fresh_id: impl FnMut() -> i64,
) -> RepoResult<()> {
    match insert(tx, order).await {
        Err(e) if e.is_id_conflict("orders") => {
            let taken = order.id;
            order.id = fresh_id();
            tracing::debug!(taken, retry_id = order.id, "Order id collision, retrying");
            insert(tx, order).await
        }
        other => other,
    }
}

/// Order header without items
pub async fn find_header<'e, E>(
    executor: E,
    restaurant_id: i64,
    order_id: i64,
) -> RepoResult<Option<Order>>
where
    E: SqliteExecutor<'e>,
{
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE id = ? AND restaurant_id = ?"
    ))
    .bind(order_id)
    .bind(restaurant_id)
    .fetch_optional(executor)
    .await?;
    Ok(order)
}

pub async fn find_items<'e, E>(executor: E, order_id: i64) -> RepoResult<Vec<OrderItem>>
where
    E: SqliteExecutor<'e>,
{
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(executor)
    .await?;
    Ok(items)
}

/// Order with items
pub async fn find_by_id(
    pool: &SqlitePool,
    restaurant_id: i64,
    order_id: i64,
) -> RepoResult<Option<Order>> {
    let Some(mut order) = find_header(pool, restaurant_id, order_id).await? else {
        return Ok(None);
    };
    order.items = find_items(pool, order.id).await?;
    Ok(Some(order))
}

/// Orders of a session, newest first, without items
pub async fn find_by_session<'e, E>(executor: E, session_id: i64) -> RepoResult<Vec<Order>>
where
    E: SqliteExecutor<'e>,
{
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE session_id = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(session_id)
    .fetch_all(executor)
    .await?;
    Ok(orders)
}

/// Orders of a session, newest first, with items
pub async fn find_by_session_with_items(
    pool: &SqlitePool,
    session_id: i64,
) -> RepoResult<Vec<Order>> {
    let mut orders = find_by_session(pool, session_id).await?;
    for order in &mut orders {
        order.items = find_items(pool, order.id).await?;
    }
    Ok(orders)
}

/// Orders with pending work in a restaurant, oldest first, with items
pub async fn find_unsettled(pool: &SqlitePool, restaurant_id: i64) -> RepoResult<Vec<Order>> {
    let mut orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {COLUMNS} FROM orders WHERE restaurant_id = ? AND status IN {UNSETTLED} ORDER BY created_at, id"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    for order in &mut orders {
        order.items = find_items(pool, order.id).await?;
    }
    Ok(orders)
}

/// Apply a status transition only if the row still holds `transition.from()`.
///
/// Returns `false` when another writer changed the status first. The audit
/// log row is written in the same transaction as the update.
pub async fn apply_transition(
    tx: &mut Transaction<'_, Sqlite>,
    order_id: i64,
    transition: &OrderTransition,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
    )
    .bind(transition.to())
    .bind(now)
    .bind(order_id)
    .bind(transition.from())
    .execute(&mut **tx)
    .await?;
    if rows.rows_affected() == 0 {
        return Ok(false);
    }

    let kind = if transition.is_override() {
        "ADMINISTRATIVE_CLOSE"
    } else {
        "VALIDATED"
    };
    sqlx::query(
        "INSERT INTO order_status_log (order_id, from_status, to_status, kind, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(order_id)
    .bind(transition.from())
    .bind(transition.to())
    .bind(kind)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(true)
}

/// Audit trail of an order, oldest first: (from, to, kind)
pub async fn status_log(
    pool: &SqlitePool,
    order_id: i64,
) -> RepoResult<Vec<(OrderStatus, OrderStatus, String)>> {
    let rows = sqlx::query_as::<_, (OrderStatus, OrderStatus, String)>(
        "SELECT from_status, to_status, kind FROM order_status_log WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Map a unique violation on `(restaurant_id, order_number)`
pub fn is_number_conflict(err: &RepoError) -> bool {
    matches!(err, RepoError::Duplicate(msg) if msg.contains("order_number"))
}
