//! Back-office order management.
//!
//! Status changes go through [`OrderService::update_status`], so the
//! transition table applies here too and cancelling restocks the items.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::{Order, OrderId, OrderStatus};

use crate::data::DataError;
use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequireAdmin, Shopper};
use crate::models::Flash;
use crate::routes::account::{OrderView, newest_first};
use crate::routes::forms::ChoiceView;
use crate::routes::products::FacetLink;
use crate::routes::{Chrome, redirect_with};
use crate::services::{OrderError, OrderService};
use crate::state::AppState;

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

impl OrdersQuery {
    /// The requested status; unknown values show every order.
    fn parsed_status(&self) -> Option<OrderStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

/// Order listing template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/index.html")]
pub struct OrdersIndexTemplate {
    pub chrome: Chrome,
    pub tabs: Vec<FacetLink>,
    pub orders: Vec<OrderView>,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders/show.html")]
pub struct OrderShowTemplate {
    pub chrome: Chrome,
    pub order: OrderView,
    pub user_id: String,
    pub next_statuses: Vec<ChoiceView>,
}

/// Tabs for each status, with counts; the first tab shows everything.
fn status_tabs(orders: &[Order], active: Option<OrderStatus>) -> Vec<FacetLink> {
    let mut tabs = vec![FacetLink {
        label: format!("All ({})", orders.len()),
        href: "/admin/orders".to_string(),
        active: active.is_none(),
    }];
    tabs.extend(OrderStatus::ALL.into_iter().map(|status| {
        let count = orders.iter().filter(|o| o.status == status).count();
        FacetLink {
            label: format!("{} ({count})", status.label()),
            href: format!("/admin/orders?status={}", status.as_str()),
            active: active == Some(status),
        }
    }));
    tabs
}

fn next_status_choices(status: OrderStatus) -> Vec<ChoiceView> {
    status
        .next_statuses()
        .iter()
        .map(|next| ChoiceView {
            value: next.as_str(),
            label: next.label(),
            selected: false,
        })
        .collect()
}

/// List orders, newest first, optionally for one status.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut orders = state.data().list_orders().await?;
    newest_first(&mut orders);
    let status = query.parsed_status();

    Ok(OrdersIndexTemplate {
        chrome: Chrome::load(&state, &shopper, "/admin/orders").await?,
        tabs: status_tabs(&orders, status),
        orders: orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .map(OrderView::from)
            .collect(),
    })
}

/// Display one order with the statuses it can move to.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order_id = OrderId::new(id);
    let order = state
        .data()
        .get_order(&order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id}")))?;

    Ok(OrderShowTemplate {
        chrome: Chrome::load(&state, &shopper, "/admin/orders").await?,
        user_id: order.user_id.to_string(),
        next_statuses: next_status_choices(order.status),
        order: OrderView::from(&order),
    })
}

/// Move an order to a new status.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect, AppError> {
    let order_id = OrderId::new(id);
    let back = format!("/admin/orders/{order_id}");

    let Ok(status) = form.status.parse::<OrderStatus>() else {
        return Ok(redirect_with(
            &shopper.session,
            Flash::error(format!("Unknown status \"{}\"", form.status)),
            &back,
        )
        .await);
    };

    match OrderService::new(state.data())
        .update_status(&order_id, status)
        .await
    {
        Ok(order) => {
            add_breadcrumb(
                "admin",
                "Order status changed",
                Some(&[("order_id", order_id.as_str()), ("status", status.as_str())][..]),
            );
            let message = format!("Order #{} is now {}", order.id, status.label());
            Ok(redirect_with(&shopper.session, Flash::success(message), &back).await)
        }
        Err(e @ OrderError::Transition(_)) => {
            let message = AppError::from(e).public_message();
            Ok(redirect_with(&shopper.session, Flash::error(message), &back).await)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete an order. Stock is not touched.
#[instrument(skip(state, admin, shopper), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let order_id = OrderId::new(id);
    let flash = match state.data().delete_order(&order_id).await {
        Ok(()) => {
            tracing::info!(order_id = %order_id, admin_id = %admin.id, "Order deleted");
            Flash::success(format!("Order #{order_id} deleted"))
        }
        Err(DataError::NotFound(_)) => Flash::error(format!("Order #{order_id} no longer exists")),
        Err(e) => return Err(e.into()),
    };
    Ok(redirect_with(&shopper.session, flash, "/admin/orders").await)
}
