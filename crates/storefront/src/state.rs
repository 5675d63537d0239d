//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use verdora_core::report::ReportOptions;

use crate::config::StorefrontConfig;
use crate::data::{DataClient, DataError};
use crate::services::EmailClient;
use crate::store::{ClientStore, PgStore};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the data endpoint client and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    data: DataClient,
    store: ClientStore,
    email: EmailClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` pool; `None` keeps carts and wishlists in memory
    ///
    /// # Errors
    ///
    /// Returns an error if the data endpoint URL is unusable.
    pub fn new(config: StorefrontConfig, pool: Option<PgPool>) -> Result<Self, DataError> {
        let data = DataClient::new(&config.data_url)?;
        let store = match &pool {
            Some(pool) => ClientStore::new(Arc::new(PgStore::new(pool.clone()))),
            None => ClientStore::in_memory(),
        };
        let email = EmailClient::new(config.email.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                data,
                store,
                email,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool, if one is configured.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the data endpoint client.
    #[must_use]
    pub fn data(&self) -> &DataClient {
        &self.inner.data
    }

    /// Get a reference to the cart and wishlist store.
    #[must_use]
    pub fn store(&self) -> &ClientStore {
        &self.inner.store
    }

    /// Get a reference to the email client.
    #[must_use]
    pub fn email(&self) -> &EmailClient {
        &self.inner.email
    }

    /// Report settings derived from configuration.
    #[must_use]
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            low_stock_threshold: self.inner.config.low_stock_threshold,
            ..ReportOptions::default()
        }
    }
}
