//! Keyed client store for carts and wishlists.
//!
//! Every shopper's cart and wishlist is a JSON document stored under a key
//! derived from a namespace and the owner:
//!
//! ```text
//! cart:user:7
//! wishlist:guest:5b0e6c1e-0f0c-4f0e-9d55-1f2a3b4c5d6e
//! ```
//!
//! Logged-in shoppers and guests never share a key, so switching accounts
//! switches the visible cart wholesale. Writes are last-write-wins per key.
//!
//! Every write publishes a [`StoreEvent`] on a broadcast channel; the
//! storefront forwards the events for the current owner to open tabs as
//! server-sent events.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::instrument;

use verdora_core::{Cart, GuestId, UserId, Wishlist};

/// Capacity of the change-event channel. Slow subscribers skip events.
const EVENT_CAPACITY: usize = 256;

/// Errors from a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A document could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

// =============================================================================
// Keys
// =============================================================================

/// Who a cart or wishlist belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(UserId),
    Guest(GuestId),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(id) => write!(f, "guest:{id}"),
        }
    }
}

/// What a key holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Cart,
    Wishlist,
}

impl Namespace {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::Wishlist => "wishlist",
        }
    }
}

/// A fully qualified storage key, e.g. `cart:user:7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    #[must_use]
    pub fn new(namespace: Namespace, owner: &Owner) -> Self {
        Self(format!("{}:{owner}", namespace.as_str()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Backend trait
// =============================================================================

/// Raw string storage behind the [`ClientStore`].
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn load(&self, key: &StorageKey) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing what was there.
    async fn save(&self, key: &StorageKey, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn remove(&self, key: &StorageKey) -> Result<(), StoreError>;
}

// =============================================================================
// Events
// =============================================================================

/// Published after every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEvent {
    pub key: StorageKey,
    pub kind: Namespace,
    /// Units in the cart or entries in the wishlist after the write.
    pub count: u32,
}

// =============================================================================
// ClientStore
// =============================================================================

/// Typed cart and wishlist access over a [`KeyValueStore`].
#[derive(Clone)]
pub struct ClientStore {
    backend: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<StoreEvent>,
}

impl fmt::Debug for ClientStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientStore")
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl ClientStore {
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { backend, events }
    }

    /// A store backed by process memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Subscribe to change events for every key.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // -------------------------------------------------------------------------
    // Carts
    // -------------------------------------------------------------------------

    /// Load a cart; a missing or unreadable document is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn load_cart(&self, owner: &Owner) -> Result<Cart, StoreError> {
        self.load(&StorageKey::new(Namespace::Cart, owner)).await
    }

    /// Replace a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn save_cart(&self, owner: &Owner, cart: &Cart) -> Result<(), StoreError> {
        let key = StorageKey::new(Namespace::Cart, owner);
        self.save(key, Namespace::Cart, cart, cart.item_count())
            .await
    }

    /// Load, modify and save a cart, returning whatever `f` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn update_cart<R: Send>(
        &self,
        owner: &Owner,
        f: impl FnOnce(&mut Cart) -> R + Send,
    ) -> Result<R, StoreError> {
        let mut cart = self.load_cart(owner).await?;
        let result = f(&mut cart);
        self.save_cart(owner, &cart).await?;
        Ok(result)
    }

    /// Delete a cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn clear_cart(&self, owner: &Owner) -> Result<(), StoreError> {
        self.remove(StorageKey::new(Namespace::Cart, owner), Namespace::Cart)
            .await
    }

    // -------------------------------------------------------------------------
    // Wishlists
    // -------------------------------------------------------------------------

    /// Load a wishlist; a missing or unreadable document is an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn load_wishlist(&self, owner: &Owner) -> Result<Wishlist, StoreError> {
        self.load(&StorageKey::new(Namespace::Wishlist, owner))
            .await
    }

    /// Replace a wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn save_wishlist(
        &self,
        owner: &Owner,
        wishlist: &Wishlist,
    ) -> Result<(), StoreError> {
        let key = StorageKey::new(Namespace::Wishlist, owner);
        let count = u32::try_from(wishlist.len()).unwrap_or(u32::MAX);
        self.save(key, Namespace::Wishlist, wishlist, count).await
    }

    /// Load, modify and save a wishlist, returning whatever `f` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn update_wishlist<R: Send>(
        &self,
        owner: &Owner,
        f: impl FnOnce(&mut Wishlist) -> R + Send,
    ) -> Result<R, StoreError> {
        let mut wishlist = self.load_wishlist(owner).await?;
        let result = f(&mut wishlist);
        self.save_wishlist(owner, &wishlist).await?;
        Ok(result)
    }

    /// Delete a wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn clear_wishlist(&self, owner: &Owner) -> Result<(), StoreError> {
        self.remove(
            StorageKey::new(Namespace::Wishlist, owner),
            Namespace::Wishlist,
        )
        .await
    }

    // -------------------------------------------------------------------------
    // Plumbing
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    async fn load<T: DeserializeOwned + Default>(&self, key: &StorageKey) -> Result<T, StoreError> {
        let Some(raw) = self.backend.load(key).await? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding malformed stored document");
                Ok(T::default())
            }
        }
    }

    async fn save<T: Serialize + Sync>(
        &self,
        key: StorageKey,
        kind: Namespace,
        value: &T,
        count: u32,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.backend.save(&key, &raw).await?;
        self.publish(StoreEvent { key, kind, count });
        Ok(())
    }

    async fn remove(&self, key: StorageKey, kind: Namespace) -> Result<(), StoreError> {
        self.backend.remove(&key).await?;
        self.publish(StoreEvent {
            key,
            kind,
            count: 0,
        });
        Ok(())
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is the common case, not an error
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use verdora_core::{Product, ProductId, WishlistItem};

    fn product(id: &str, price: &str) -> Product {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": format!("Plant {id}"),
            "price": price,
            "stock": 10
        }))
        .unwrap()
    }

    #[test]
    fn test_storage_keys() {
        let user = Owner::User(UserId::new("7"));
        assert_eq!(StorageKey::new(Namespace::Cart, &user).as_str(), "cart:user:7");

        let guest_id = GuestId::generate();
        let guest = Owner::Guest(guest_id);
        assert_eq!(
            StorageKey::new(Namespace::Wishlist, &guest).to_string(),
            format!("wishlist:guest:{guest_id}")
        );
    }

    #[tokio::test]
    async fn test_missing_cart_is_empty() {
        let store = ClientStore::in_memory();
        let cart = store
            .load_cart(&Owner::User(UserId::new("1")))
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_owners_do_not_share_carts() {
        let store = ClientStore::in_memory();
        let alice = Owner::User(UserId::new("alice"));
        let bob = Owner::User(UserId::new("bob"));
        let guest = Owner::Guest(GuestId::generate());

        store
            .update_cart(&alice, |cart| cart.add(product("1", "10"), 2))
            .await
            .unwrap();
        store
            .update_cart(&guest, |cart| cart.add(product("2", "5"), 1))
            .await
            .unwrap();

        let alice_cart = store.load_cart(&alice).await.unwrap();
        assert_eq!(alice_cart.item_count(), 2);
        assert_eq!(alice_cart.quantity_of(&ProductId::new("2")), 0);
        assert!(store.load_cart(&bob).await.unwrap().is_empty());
        assert_eq!(store.load_cart(&guest).await.unwrap().item_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_document_reads_as_empty() {
        let backend = Arc::new(MemoryStore::new());
        let owner = Owner::User(UserId::new("9"));
        backend
            .save(&StorageKey::new(Namespace::Cart, &owner), "{not json")
            .await
            .unwrap();

        let store = ClientStore::new(backend);
        assert!(store.load_cart(&owner).await.unwrap().is_empty());

        // The next write replaces the garbage
        store
            .update_cart(&owner, |cart| cart.add(product("3", "1"), 1))
            .await
            .unwrap();
        assert_eq!(store.load_cart(&owner).await.unwrap().item_count(), 1);
    }

    #[tokio::test]
    async fn test_writes_publish_events() {
        let store = ClientStore::in_memory();
        let mut events = store.subscribe();
        let owner = Owner::User(UserId::new("5"));

        store
            .update_cart(&owner, |cart| cart.add(product("1", "3"), 4))
            .await
            .unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.key.as_str(), "cart:user:5");
        assert_eq!(event.kind, Namespace::Cart);
        assert_eq!(event.count, 4);

        let added = store
            .update_wishlist(&owner, |list| {
                list.add(WishlistItem::from(&product("1", "3")))
            })
            .await
            .unwrap();
        assert!(added);
        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, Namespace::Wishlist);
        assert_eq!(event.count, 1);

        store.clear_cart(&owner).await.unwrap();
        let event = events.recv().await.unwrap();
        assert_eq!(event.count, 0);
        assert!(store.load_cart(&owner).await.unwrap().is_empty());
    }
}
