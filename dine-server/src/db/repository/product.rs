//! Product Repository

use super::{RepoError, RepoResult};
use shared::models::{Product, ProductCreate};
use sqlx::{SqliteExecutor, SqlitePool};

const COLUMNS: &str = "id, restaurant_id, name, price, is_active";

/// Active product within a restaurant
pub async fn find_active<'e, E>(
    executor: E,
    restaurant_id: i64,
    product_id: i64,
) -> RepoResult<Option<Product>>
where
    E: SqliteExecutor<'e>,
{
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {COLUMNS} FROM products WHERE id = ? AND restaurant_id = ? AND is_active = 1"
    ))
    .bind(product_id)
    .bind(restaurant_id)
    .fetch_optional(executor)
    .await?;
    Ok(product)
}

pub async fn create(
    pool: &SqlitePool,
    restaurant_id: i64,
    data: ProductCreate,
) -> RepoResult<Product> {
    if !data.price.is_finite() || data.price < 0.0 {
        return Err(RepoError::Validation(format!(
            "price must be non-negative, got {}",
            data.price
        )));
    }
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO products (id, restaurant_id, name, price, is_active) VALUES (?1, ?2, ?3, ?4, 1)",
    )
    .bind(id)
    .bind(restaurant_id)
    .bind(&data.name)
    .bind(data.price)
    .execute(pool)
    .await?;
    find_active(pool, restaurant_id, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create product".into()))
}

pub async fn set_active(pool: &SqlitePool, product_id: i64, is_active: bool) -> RepoResult<()> {
    let rows = sqlx::query("UPDATE products SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(product_id)
        .execute(pool)
        .await?;
    if rows.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Product {product_id} not found")));
    }
    Ok(())
}
