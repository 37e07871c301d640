//! In-process stores used as test doubles for the HTTP layer.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ItemStore, StoreError, StoreResult, Upsert};
use crate::models::Item;

#[derive(Debug, Default)]
struct Table {
    last_id: i32,
    rows: BTreeMap<i32, Item>,
}

impl Table {
    fn find_by_name(&self, name: &str) -> Option<&Item> {
        let wanted = name.to_lowercase();
        self.rows.values().find(|item| item.name.to_lowercase() == wanted)
    }

    fn insert(&mut self, name: &str, quantity: i32) -> Item {
        self.last_id += 1;
        let item = Item {
            id: self.last_id,
            name: name.to_string(),
            quantity,
        };
        self.rows.insert(item.id, item.clone());
        item
    }

    fn add_quantity(&mut self, id: i32, delta: i32) -> StoreResult<Option<Item>> {
        let Some(item) = self.rows.get_mut(&id) else {
            return Ok(None);
        };
        item.quantity = item
            .quantity
            .checked_add(delta)
            .ok_or_else(|| StoreError::Backend(format!("quantity overflow on item {}", id)))?;
        Ok(Some(item.clone()))
    }
}

/// Ids are handed out from 1 and never reused, like a SERIAL column.
#[derive(Debug, Default, Clone)]
pub struct InMemoryItemStore {
    table: Arc<RwLock<Table>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn list_all(&self) -> StoreResult<Vec<Item>> {
        Ok(self.table.read().await.rows.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i32) -> StoreResult<Option<Item>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
        Ok(self.table.read().await.find_by_name(name).cloned())
    }

    async fn create(&self, name: &str, quantity: i32) -> StoreResult<Item> {
        Ok(self.table.write().await.insert(name, quantity))
    }

    async fn increase_quantity(&self, id: i32, delta: i32) -> StoreResult<Option<Item>> {
        self.table.write().await.add_quantity(id, delta)
    }

    async fn update(&self, id: i32, name: &str, quantity: i32) -> StoreResult<Option<Item>> {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&id).map(|item| {
            item.name = name.to_string();
            item.quantity = quantity;
            item.clone()
        }))
    }

    async fn delete(&self, id: i32) -> StoreResult<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn create_or_merge(&self, name: &str, quantity: i32) -> StoreResult<Upsert> {
        let mut table = self.table.write().await;
        match table.find_by_name(name).map(|item| item.id) {
            Some(id) => match table.add_quantity(id, quantity)? {
                Some(merged) => Ok(Upsert::Merged(merged)),
                None => Ok(Upsert::Created(table.insert(name, quantity))),
            },
            None => Ok(Upsert::Created(table.insert(name, quantity))),
        }
    }
}

/// Fails every call, as a store with no reachable database would.
#[derive(Debug, Default, Clone)]
pub struct FailingItemStore;

impl FailingItemStore {
    fn fail<T>() -> StoreResult<T> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

#[async_trait]
impl ItemStore for FailingItemStore {
    async fn list_all(&self) -> StoreResult<Vec<Item>> {
        Self::fail()
    }

    async fn get_by_id(&self, _id: i32) -> StoreResult<Option<Item>> {
        Self::fail()
    }

    async fn find_by_name(&self, _name: &str) -> StoreResult<Option<Item>> {
        Self::fail()
    }

    async fn create(&self, _name: &str, _quantity: i32) -> StoreResult<Item> {
        Self::fail()
    }

    async fn increase_quantity(&self, _id: i32, _delta: i32) -> StoreResult<Option<Item>> {
        Self::fail()
    }

    async fn update(&self, _id: i32, _name: &str, _quantity: i32) -> StoreResult<Option<Item>> {
        Self::fail()
    }

    async fn delete(&self, _id: i32) -> StoreResult<bool> {
        Self::fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_sequential_and_not_reused() {
        let store = InMemoryItemStore::new();
        let a = store.create("Milk", 1).await.unwrap();
        let b = store.create("Bread", 1).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        assert!(store.delete(b.id).await.unwrap());
        let c = store.create("Eggs", 1).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn find_by_name_ignores_case_but_not_content() {
        let store = InMemoryItemStore::new();
        let milk = store.create("Milk", 1).await.unwrap();

        assert_eq!(store.find_by_name("MILK").await.unwrap(), Some(milk));
        assert_eq!(store.find_by_name("Milk ").await.unwrap(), None);
        assert_eq!(store.find_by_name("Mil").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let store = InMemoryItemStore::new();
        for name in ["Zucchini", "Apples", "Milk"] {
            store.create(name, 1).await.unwrap();
        }
        let ids: Vec<i32> = store.list_all().await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn increase_quantity_on_missing_row_is_none() {
        let store = InMemoryItemStore::new();
        assert_eq!(store.increase_quantity(9, 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn increase_quantity_overflow_is_a_store_error() {
        let store = InMemoryItemStore::new();
        let item = store.create("Rice", i32::MAX).await.unwrap();
        assert!(matches!(
            store.increase_quantity(item.id, 1).await,
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn create_or_merge_merges_any_casing() {
        let store = InMemoryItemStore::new();
        let first = store.create_or_merge("Milk", 2).await.unwrap();
        let second = store.create_or_merge("mILK", 3).await.unwrap();

        let Upsert::Created(created) = first else {
            panic!("first call should create");
        };
        assert_eq!(
            second,
            Upsert::Merged(Item {
                id: created.id,
                name: "Milk".to_string(),
                quantity: 5
            })
        );
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    /// The trait's default path, exercised through a store that doesn't
    /// override it.
    #[tokio::test]
    async fn default_create_or_merge_composes_lookup_and_write() {
        struct Plain(InMemoryItemStore);

        #[async_trait]
        impl ItemStore for Plain {
            async fn list_all(&self) -> StoreResult<Vec<Item>> {
                self.0.list_all().await
            }
            async fn get_by_id(&self, id: i32) -> StoreResult<Option<Item>> {
                self.0.get_by_id(id).await
            }
            async fn find_by_name(&self, name: &str) -> StoreResult<Option<Item>> {
                self.0.find_by_name(name).await
            }
            async fn create(&self, name: &str, quantity: i32) -> StoreResult<Item> {
                self.0.create(name, quantity).await
            }
            async fn increase_quantity(&self, id: i32, delta: i32) -> StoreResult<Option<Item>> {
                self.0.increase_quantity(id, delta).await
            }
            async fn update(&self, id: i32, name: &str, quantity: i32) -> StoreResult<Option<Item>> {
                self.0.update(id, name, quantity).await
            }
            async fn delete(&self, id: i32) -> StoreResult<bool> {
                self.0.delete(id).await
            }
        }

        let store = Plain(InMemoryItemStore::new());
        assert!(matches!(
            store.create_or_merge("Tea", 1).await.unwrap(),
            Upsert::Created(_)
        ));
        let Upsert::Merged(merged) = store.create_or_merge("TEA", 4).await.unwrap() else {
            panic!("second call should merge");
        };
        assert_eq!((merged.name.as_str(), merged.quantity), ("Tea", 5));
    }

    #[tokio::test]
    async fn failing_store_fails_every_call() {
        let store = FailingItemStore;
        assert!(store.list_all().await.is_err());
        assert!(store.create_or_merge("Milk", 1).await.is_err());
        assert!(store.delete(1).await.is_err());
    }
}
