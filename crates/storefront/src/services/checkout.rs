//! Checkout as a compensating sequence of stock reservations.
//!
//! 1. Reserve stock for every cart line, in cart order.
//! 2. On the first failure, release everything reserved so far and stop.
//! 3. Create the order as `pending`; if that fails, release everything.
//! 4. Clear the cart.
//!
//! A failure after step 3 leaves a placed order and a cart that still shows
//! its items; the order stands.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use verdora_core::{NewOrder, Order, PaymentMethod, ShippingInfo, UserId};

use crate::data::{DataClient, DataError};
use crate::services::inventory::Inventory;
use crate::store::{ClientStore, Owner, StoreError};

/// Errors that stop a checkout. Stock is never left reserved.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to buy.
    #[error("cart is empty")]
    EmptyCart,

    /// Not enough stock for one line.
    #[error("only {available} of {name} left in stock")]
    OutOfStock { name: String, available: u32 },

    /// A cart line refers to a deleted product.
    #[error("{name} is no longer available")]
    ProductMissing { name: String },

    /// Data endpoint error.
    #[error("data endpoint error: {0}")]
    Data(#[from] DataError),

    /// Cart storage error.
    #[error("cart storage error: {0}")]
    Store(#[from] StoreError),
}

/// Places orders.
pub struct CheckoutService<'a> {
    data: &'a DataClient,
    store: &'a ClientStore,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(data: &'a DataClient, store: &'a ClientStore) -> Self {
        Self { data, store }
    }

    /// Turn the user's cart into a pending order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` for an empty cart, the first stock
    /// failure, or the endpoint error that aborted the checkout. In every error
    /// case all stock taken by this call has been handed back (failures to do
    /// so are logged).
    #[instrument(skip(self, shipping), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: &UserId,
        shipping: ShippingInfo,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Order, CheckoutError> {
        let owner = Owner::User(user_id.clone());
        let cart = self.store.load_cart(&owner).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let inventory = Inventory::new(self.data);
        let mut reserved = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            match inventory.reserve(item).await {
                Ok(reservation) => reserved.push(reservation),
                Err(e) => {
                    tracing::warn!(error = %e, reserved = reserved.len(), "Checkout aborted, releasing stock");
                    inventory.release_all(&reserved).await;
                    return Err(e);
                }
            }
        }

        let new_order = NewOrder::from_cart(user_id.clone(), &cart, shipping, payment_method, now);
        let order = match self.data.create_order(&new_order).await {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(error = %e, "Order creation failed, releasing stock");
                inventory.release_all(&reserved).await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.clear_cart(&owner).await {
            tracing::warn!(order_id = %order.id, error = %e, "Order placed but cart could not be cleared");
        }

        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }
}
