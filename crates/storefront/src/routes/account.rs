//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::{Order, OrderId, OrderStatus};

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequireAuth, Shopper};
use crate::models::{CurrentUser, Flash, session_keys};
use crate::routes::cart::CartLineView;
use crate::routes::{Chrome, redirect_with};
use crate::services::{AuthService, OrderError, OrderService};
use crate::state::AppState;

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub customer: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub placed_at: String,
    pub total: String,
    pub item_count: u32,
    pub payment: &'static str,
    pub ship_to: Vec<String>,
    pub contact: String,
    pub lines: Vec<CartLineView>,
    pub can_cancel: bool,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        let shipping = &order.shipping;
        Self {
            id: order.id.to_string(),
            customer: shipping.full_name.clone(),
            status: order.status.as_str(),
            status_label: order.status.label(),
            placed_at: order.created_at.format("%b %-d, %Y %H:%M UTC").to_string(),
            total: order.total.to_string(),
            item_count: order.item_count(),
            payment: order.payment_method.label(),
            ship_to: vec![
                shipping.full_name.clone(),
                shipping.address.clone(),
                format!("{} {}", shipping.postal_code, shipping.city),
                shipping.country.clone(),
            ],
            contact: format!("{} / {}", shipping.email, shipping.phone),
            lines: order.items.iter().map(CartLineView::from).collect(),
            can_cancel: order.status.is_customer_cancellable(),
        }
    }
}

/// Newest first.
pub(crate) fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub chrome: Chrome,
    pub name: String,
    pub email: String,
    pub role: &'static str,
    pub recent_orders: Vec<OrderView>,
}

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct AccountOrdersTemplate {
    pub chrome: Chrome,
    pub orders: Vec<OrderView>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order.html")]
pub struct AccountOrderTemplate {
    pub chrome: Chrome,
    pub order: OrderView,
}

/// Display account overview page.
#[instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let mut orders = state.data().list_orders_for(&current_user.id).await?;
    newest_first(&mut orders);

    Ok(AccountIndexTemplate {
        chrome: Chrome::load(&state, &shopper, "/account").await?,
        name: current_user.name,
        email: current_user.email.to_string(),
        role: current_user.role.as_str(),
        recent_orders: orders.iter().take(3).map(OrderView::from).collect(),
    })
}

/// Update the display name.
#[instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    shopper: Shopper,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let auth = AuthService::new(state.data());
    let user = match auth.update_name(&current_user.id, &form.name).await {
        Ok(user) => user,
        Err(e) => {
            let message = AppError::from(e).public_message();
            return Ok(redirect_with(&shopper.session, Flash::error(message), "/account").await);
        }
    };

    shopper
        .session
        .insert(session_keys::CURRENT_USER, CurrentUser::from(&user))
        .await?;

    Ok(redirect_with(&shopper.session, Flash::success("Profile updated"), "/account").await)
}

/// Display order history.
#[instrument(skip_all, fields(user_id = %current_user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let mut orders = state.data().list_orders_for(&current_user.id).await?;
    newest_first(&mut orders);

    Ok(AccountOrdersTemplate {
        chrome: Chrome::load(&state, &shopper, "/account").await?,
        orders: orders.iter().map(OrderView::from).collect(),
    })
}

/// Display one of the user's orders.
#[instrument(skip(state, current_user, shopper))]
pub async fn order_detail(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order = OrderService::new(state.data())
        .get_for_customer(&current_user.id, &OrderId::new(id))
        .await?;

    Ok(AccountOrderTemplate {
        chrome: Chrome::load(&state, &shopper, "/account").await?,
        order: OrderView::from(&order),
    })
}

/// Cancel one of the user's orders while it is still pending or confirmed.
#[instrument(skip(state, current_user, shopper))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireAuth(current_user): RequireAuth,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let order_id = OrderId::new(id);
    let back = format!("/account/orders/{order_id}");

    match OrderService::new(state.data())
        .cancel_for_customer(&current_user.id, &order_id)
        .await
    {
        Ok(order) => {
            debug_assert_eq!(order.status, OrderStatus::Cancelled);
            add_breadcrumb(
                "order",
                "Customer cancelled order",
                Some(&[("order_id", order_id.as_str())][..]),
            );
            Ok(redirect_with(
                &shopper.session,
                Flash::success("Your order was cancelled"),
                &back,
            )
            .await)
        }
        Err(e @ (OrderError::NotCancellable(_) | OrderError::Transition(_))) => {
            let message = AppError::from(e).public_message();
            Ok(redirect_with(&shopper.session, Flash::error(message), &back).await)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn order(id: &str, status: &str, day: u32) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "userId": "7",
            "items": [{ "id": "1", "name": "Snake Plant", "price": "20.00", "quantity": 2 }],
            "shipping": {
                "fullName": "Ivy Green",
                "email": "ivy@example.com",
                "phone": "+31 20 123 4567",
                "address": "Canal 1",
                "city": "Amsterdam",
                "postalCode": "1011 AB",
                "country": "NL"
            },
            "paymentMethod": "card",
            "total": "40.00",
            "status": status,
            "createdAt": Utc.with_ymd_and_hms(2026, 3, day, 9, 30, 0).unwrap()
        }))
        .unwrap()
    }

    #[test]
    fn test_order_view() {
        let view = OrderView::from(&order("12", "confirmed", 4));
        assert_eq!(view.status, "confirmed");
        assert_eq!(view.total, "$40.00");
        assert_eq!(view.item_count, 2);
        assert_eq!(view.placed_at, "Mar 4, 2026 09:30 UTC");
        assert_eq!(view.ship_to[2], "1011 AB Amsterdam");
        assert!(view.can_cancel);

        assert!(!OrderView::from(&order("13", "shipped", 4)).can_cancel);
    }

    #[test]
    fn test_newest_first() {
        let mut orders = vec![
            order("1", "pending", 1),
            order("2", "pending", 9),
            order("3", "pending", 5),
        ];
        newest_first(&mut orders);
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "1"]);
    }
}
