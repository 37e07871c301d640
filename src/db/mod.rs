use async_trait::async_trait;
use thiserror::Error;

use crate::models::Item;

#[cfg(test)]
pub mod memory;
mod postgres;

pub use postgres::PgItemStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure reported by the in-process test stores.
    #[cfg(test)]
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What a create-or-merge call did with the incoming quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// No item had that name; this is the new row.
    Created(Item),
    /// An item with that name (any casing) absorbed the quantity.
    Merged(Item),
}

/// Data access for the `items` table. `None` means no row matched.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Every item, ordered by id ascending.
    async fn list_all(&self) -> StoreResult<Vec<Item>>;

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Item>>;

    /// Case-insensitive exact match on name.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Item>>;

    async fn create(&self, name: &str, quantity: i32) -> StoreResult<Item>;

    /// Adds `delta` to the stored quantity in a single statement.
    async fn increase_quantity(&self, id: i32, delta: i32) -> StoreResult<Option<Item>>;

    /// Replaces both name and quantity.
    async fn update(&self, id: i32, name: &str, quantity: i32) -> StoreResult<Option<Item>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i32) -> StoreResult<bool>;

    /// Adds `quantity` to the item named `name` (any casing), or inserts a new
    /// item when there is none.
    ///
    /// This default takes two round trips with nothing between them, so two
    /// concurrent calls for a new name can both insert. Stores that can
    /// serialize the pair should override it.
    async fn create_or_merge(&self, name: &str, quantity: i32) -> StoreResult<Upsert> {
        if let Some(existing) = self.find_by_name(name).await? {
            if let Some(merged) = self.increase_quantity(existing.id, quantity).await? {
                return Ok(Upsert::Merged(merged));
            }
            // Deleted between the lookup and the increment.
        }
        Ok(Upsert::Created(self.create(name, quantity).await?))
    }
}
