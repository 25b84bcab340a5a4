//! Restaurant Repository

use super::{RepoError, RepoResult};
use shared::models::{Restaurant, RestaurantCreate};
use sqlx::{SqliteExecutor, SqlitePool};

const COLUMNS: &str = "id, name, tax_rate, order_seq, created_at";

pub async fn find_by_id<'e, E>(executor: E, id: i64) -> RepoResult<Option<Restaurant>>
where
    E: SqliteExecutor<'e>,
{
    let restaurant =
        sqlx::query_as::<_, Restaurant>(&format!("SELECT {COLUMNS} FROM restaurants WHERE id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await?;
    Ok(restaurant)
}

pub async fn create(pool: &SqlitePool, data: RestaurantCreate) -> RepoResult<Restaurant> {
    if !data.tax_rate.is_finite() || data.tax_rate < 0.0 {
        return Err(RepoError::Validation(format!(
            "tax_rate must be a non-negative fraction, got {}",
            data.tax_rate
        )));
    }
    let id = shared::util::snowflake_id();
    let now = shared::util::now_millis();
    sqlx::query(
        "INSERT INTO restaurants (id, name, tax_rate, order_seq, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
    )
    .bind(id)
    .bind(&data.name)
    .bind(data.tax_rate)
    .bind(now)
    .execute(pool)
    .await?;
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create restaurant".into()))
}

/// Bump the per-restaurant order counter and return the new value.
///
/// Run inside the order-creation transaction so the number is released
/// again if the order insert fails.
pub async fn next_order_seq<'e, E>(executor: E, restaurant_id: i64) -> RepoResult<i64>
where
    E: SqliteExecutor<'e>,
{
    let seq: Option<i64> = sqlx::query_scalar(
        "UPDATE restaurants SET order_seq = order_seq + 1 WHERE id = ? RETURNING order_seq",
    )
    .bind(restaurant_id)
    .fetch_optional(executor)
    .await?;
    seq.ok_or_else(|| RepoError::NotFound(format!("Restaurant {restaurant_id} not found")))
}

/// Zero-padded order number ("000042")
pub fn format_order_number(seq: i64) -> String {
    format!("{seq:06}")
}
