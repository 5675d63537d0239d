//! `PostgreSQL` backend (`storefront.client_store`).
//!
//! Values are stored as text rather than `JSONB` so that a corrupted document
//! can still be read back and discarded by the [`ClientStore`](super::ClientStore).

use async_trait::async_trait;
use sqlx::PgPool;

use super::{KeyValueStore, StorageKey, StoreError};

/// Store backed by the `storefront.client_store` table.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for PgStore {
    async fn load(&self, key: &StorageKey) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM storefront.client_store WHERE key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn save(&self, key: &StorageKey, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO storefront.client_store (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = NOW()
            ",
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM storefront.client_store WHERE key = $1")
            .bind(key.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
