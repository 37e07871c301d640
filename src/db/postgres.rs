use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use tracing::debug;

use super::{ItemStore, StoreResult, Upsert};
use crate::models::Item;

/// `ItemStore` over the PostgreSQL `items` table.
#[derive(Debug, Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Query helpers take any executor so `create_or_merge` can run them inside
// its transaction.

async fn find_by_name<'e, E: PgExecutor<'e>>(executor: E, name: &str) -> StoreResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(
        "SELECT id, name, quantity FROM items
         WHERE LOWER(name) = LOWER($1)
         ORDER BY id
         LIMIT 1",
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

async fn insert<'e, E: PgExecutor<'e>>(executor: E, name: &str, quantity: i32) -> StoreResult<Item> {
    let item = sqlx::query_as::<_, Item>(
        "INSERT INTO items (name, quantity) VALUES ($1, $2) RETURNING id, name, quantity",
    )
    .bind(name)
    .bind(quantity)
    .fetch_one(executor)
    .await?;

    Ok(item)
}

async fn add_quantity<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i32,
    delta: i32,
) -> StoreResult<Option<Item>> {
    let item = sqlx::query_as::<_, Item>(
        "UPDATE items SET quantity = quantity + $1 WHERE id = $2 RETURNING id, name, quantity",
    )
    .bind(delta)
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(item)
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn list_all(&self) -> StoreResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT id, name, quantity FROM items ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT id, name, quantity FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
        find_by_name(&self.pool, name).await
    }

    async fn create(&self, name: &str, quantity: i32) -> StoreResult<Item> {
        insert(&self.pool, name, quantity).await
    }

    async fn increase_quantity(&self, id: i32, delta: i32) -> StoreResult<Option<Item>> {
        add_quantity(&self.pool, id, delta).await
    }

    async fn update(&self, id: i32, name: &str, quantity: i32) -> StoreResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name     = $1,
                quantity = $2
            WHERE id = $3
            RETURNING id, name, quantity
            "#,
        )
        .bind(name)
        .bind(quantity)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    async fn delete(&self, id: i32) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Runs lookup and write in one transaction holding an advisory lock keyed
    /// on the lower-cased name, so concurrent posts of the same name queue up
    /// instead of inserting twice.
    async fn create_or_merge(&self, name: &str, quantity: i32) -> StoreResult<Upsert> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext(LOWER($1)))")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        let outcome = match find_by_name(&mut *tx, name).await? {
            Some(existing) => match add_quantity(&mut *tx, existing.id, quantity).await? {
                Some(merged) => Upsert::Merged(merged),
                None => Upsert::Created(insert(&mut *tx, name, quantity).await?),
            },
            None => Upsert::Created(insert(&mut *tx, name, quantity).await?),
        };

        tx.commit().await?;
        debug!(item_name = name, ?outcome, "create_or_merge committed");

        Ok(outcome)
    }
}
