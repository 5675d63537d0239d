//! Stock reservations against the data endpoint.
//!
//! The endpoint has no transactions, so stock is moved with read-then-PATCH
//! steps and every decrement is recorded as a [`Reservation`] that can be
//! handed back. Handing back adds the quantity to the *current* stock rather
//! than restoring the value read earlier, so concurrent changes survive.

use tracing::instrument;

use verdora_core::{CartItem, ProductId};

use crate::data::{DataClient, DataError};
use crate::services::checkout::CheckoutError;

/// Stock taken for one cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
}

/// Stock operations over the data endpoint.
pub struct Inventory<'a> {
    data: &'a DataClient,
}

impl<'a> Inventory<'a> {
    #[must_use]
    pub const fn new(data: &'a DataClient) -> Self {
        Self { data }
    }

    /// Take stock for one cart line.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::ProductMissing` if the product is gone,
    /// `CheckoutError::OutOfStock` if there is not enough left, or
    /// `CheckoutError::Data` if the endpoint fails.
    #[instrument(skip(self, item), fields(product_id = %item.product.id, quantity = item.quantity))]
    pub async fn reserve(&self, item: &CartItem) -> Result<Reservation, CheckoutError> {
        let product = self
            .data
            .get_product(&item.product.id)
            .await?
            .ok_or_else(|| CheckoutError::ProductMissing {
                name: item.product.name.clone(),
            })?;

        if product.stock < item.quantity {
            return Err(CheckoutError::OutOfStock {
                name: product.name,
                available: product.stock,
            });
        }

        self.data
            .set_stock(&product.id, product.stock - item.quantity)
            .await?;

        Ok(Reservation {
            product_id: product.id,
            name: product.name,
            quantity: item.quantity,
        })
    }

    /// Give one reservation back.
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be read or written.
    #[instrument(skip(self, reservation), fields(product_id = %reservation.product_id))]
    pub async fn release(&self, reservation: &Reservation) -> Result<(), DataError> {
        self.add_stock(&reservation.product_id, reservation.quantity)
            .await
    }

    /// Give every reservation back, newest first.
    ///
    /// Failures are logged and skipped so one bad product does not strand the
    /// rest. Returns how many could not be released.
    pub async fn release_all(&self, reservations: &[Reservation]) -> usize {
        let mut failed = 0;
        for reservation in reservations.iter().rev() {
            if let Err(e) = self.release(reservation).await {
                failed += 1;
                tracing::error!(
                    product_id = %reservation.product_id,
                    quantity = reservation.quantity,
                    error = %e,
                    "Failed to release stock reservation"
                );
            }
        }
        if failed == 0 && !reservations.is_empty() {
            tracing::info!(count = reservations.len(), "Stock reservations released");
        }
        failed
    }

    /// Put the items of a cancelled order back on the shelf.
    ///
    /// Products deleted since the order was placed are skipped. Returns how
    /// many lines could not be restocked.
    pub async fn restock(&self, items: &[CartItem]) -> usize {
        let mut failed = 0;
        for item in items {
            match self.add_stock(&item.product.id, item.quantity).await {
                Ok(()) => {}
                Err(DataError::NotFound(_)) => {
                    tracing::warn!(product_id = %item.product.id, "Restock skipped, product no longer exists");
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(product_id = %item.product.id, error = %e, "Restock failed");
                }
            }
        }
        failed
    }

    async fn add_stock(&self, id: &ProductId, quantity: u32) -> Result<(), DataError> {
        let product = self
            .data
            .get_product(id)
            .await?
            .ok_or_else(|| DataError::NotFound(format!("products/{id}")))?;
        self.data
            .set_stock(id, product.stock.saturating_add(quantity))
            .await?;
        Ok(())
    }
}
