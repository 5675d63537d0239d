//! In-process backend, used when no database is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, StorageKey, StoreError};

/// A `HashMap` behind an async lock. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key.as_str()).cloned())
    }

    async fn save(&self, key: &StorageKey, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.as_str().to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StoreError> {
        self.entries.write().await.remove(key.as_str());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{Namespace, Owner};
    use verdora_core::UserId;

    #[tokio::test]
    async fn test_save_load_remove() {
        let store = MemoryStore::new();
        let key = StorageKey::new(Namespace::Cart, &Owner::User(UserId::new("1")));

        assert_eq!(store.load(&key).await.unwrap(), None);
        store.save(&key, "[]").await.unwrap();
        assert_eq!(store.load(&key).await.unwrap().as_deref(), Some("[]"));
        assert_eq!(store.len().await, 1);

        store.remove(&key).await.unwrap();
        assert!(store.is_empty().await);
        // Removing twice is fine
        store.remove(&key).await.unwrap();
    }
}
