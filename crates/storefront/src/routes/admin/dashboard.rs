//! Dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, Shopper};
use crate::routes::Chrome;
use crate::routes::account::{OrderView, newest_first};
use crate::routes::admin::reports::{ReportView, load_report};
use crate::state::AppState;

const RECENT_ORDERS: usize = 5;

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub chrome: Chrome,
    pub admin_name: String,
    pub report: ReportView,
    pub recent_orders: Vec<OrderView>,
}

/// Display the dashboard: headline figures, recent orders and low stock.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let report = load_report(&state).await?;
    let mut orders = state.data().list_orders().await?;
    newest_first(&mut orders);

    Ok(DashboardTemplate {
        chrome: Chrome::load(&state, &shopper, "/admin").await?,
        admin_name: admin.name,
        report: ReportView::from(&report),
        recent_orders: orders
            .iter()
            .take(RECENT_ORDERS)
            .map(OrderView::from)
            .collect(),
    })
}
