//! Order status changes for customers and the back-office.

use thiserror::Error;
use tracing::instrument;

use verdora_core::{Order, OrderId, OrderStatus, TransitionError, UserId};

use crate::data::{DataClient, DataError};
use crate::services::inventory::Inventory;

/// Errors from order status changes.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No such order (or not one of the caller's).
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The transition table does not allow the move.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Customers may only cancel early.
    #[error("order is already {0} and can no longer be cancelled")]
    NotCancellable(OrderStatus),

    /// Data endpoint error.
    #[error("data endpoint error: {0}")]
    Data(#[from] DataError),
}

/// Order lifecycle operations.
pub struct OrderService<'a> {
    data: &'a DataClient,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(data: &'a DataClient) -> Self {
        Self { data }
    }

    /// Fetch an order that belongs to `user_id`.
    ///
    /// Orders of other users are reported as missing.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` if there is no such order for this user.
    pub async fn get_for_customer(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<Order, OrderError> {
        self.data
            .get_order(order_id)
            .await?
            .filter(|order| &order.user_id == user_id)
            .ok_or_else(|| OrderError::NotFound(order_id.clone()))
    }

    /// Cancel one of the customer's own orders and restock its items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotCancellable` once the order is past
    /// `confirmed`, or `OrderError::NotFound` if it is not theirs.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn cancel_for_customer(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
    ) -> Result<Order, OrderError> {
        let order = self.get_for_customer(user_id, order_id).await?;
        if !order.status.is_customer_cancellable() {
            return Err(OrderError::NotCancellable(order.status));
        }
        self.apply(order, OrderStatus::Cancelled).await
    }

    /// Move an order to `status` (back-office).
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Transition` if the table forbids the move.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn update_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let order = self
            .data
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.clone()))?;
        self.apply(order, status).await
    }

    async fn apply(&self, mut order: Order, status: OrderStatus) -> Result<Order, OrderError> {
        let from = order.status;
        order.transition(status)?;

        let updated = self.data.set_order_status(&order.id, status).await?;
        tracing::info!(order_id = %updated.id, %from, to = %status, "Order status changed");

        if status == OrderStatus::Cancelled {
            let failed = Inventory::new(self.data).restock(&updated.items).await;
            if failed > 0 {
                tracing::error!(order_id = %updated.id, failed, "Cancelled order only partly restocked");
            }
        }

        Ok(updated)
    }
}
