//! Sales and inventory report.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use verdora_core::report::SalesReport;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{RequireAdmin, Shopper};
use crate::routes::Chrome;
use crate::state::AppState;

/// Status count row.
#[derive(Debug, Clone)]
pub struct StatusCountView {
    pub status: &'static str,
    pub label: &'static str,
    pub count: usize,
}

/// Best seller row.
#[derive(Debug, Clone)]
pub struct TopProductView {
    pub id: String,
    pub name: String,
    pub units: u32,
    pub revenue: String,
}

/// One day of revenue.
#[derive(Debug, Clone)]
pub struct DailyRevenueView {
    pub date: String,
    pub orders: usize,
    pub revenue: String,
}

/// Low stock row.
#[derive(Debug, Clone)]
pub struct LowStockView {
    pub id: String,
    pub name: String,
    pub stock: u32,
    pub sold_out: bool,
}

/// Report figures formatted for templates.
#[derive(Debug, Clone)]
pub struct ReportView {
    pub revenue: String,
    pub order_count: usize,
    pub billable_orders: usize,
    pub average_order_value: String,
    pub pending: usize,
    pub by_status: Vec<StatusCountView>,
    pub top_products: Vec<TopProductView>,
    pub daily_revenue: Vec<DailyRevenueView>,
    pub low_stock: Vec<LowStockView>,
    pub product_count: usize,
    pub customers: usize,
    pub admins: usize,
}

impl From<&SalesReport> for ReportView {
    fn from(report: &SalesReport) -> Self {
        Self {
            revenue: report.revenue.to_string(),
            order_count: report.order_count,
            billable_orders: report.billable_orders,
            average_order_value: report.average_order_value.to_string(),
            pending: report.count_for(verdora_core::OrderStatus::Pending),
            by_status: report
                .by_status
                .iter()
                .map(|(status, count)| StatusCountView {
                    status: status.as_str(),
                    label: status.label(),
                    count: *count,
                })
                .collect(),
            top_products: report
                .top_products
                .iter()
                .map(|p| TopProductView {
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    units: p.units,
                    revenue: p.revenue.to_string(),
                })
                .collect(),
            daily_revenue: report
                .daily_revenue
                .iter()
                .map(|day| DailyRevenueView {
                    date: day.date.format("%Y-%m-%d").to_string(),
                    orders: day.orders,
                    revenue: day.revenue.to_string(),
                })
                .collect(),
            low_stock: report
                .low_stock
                .iter()
                .map(|p| LowStockView {
                    id: p.id.to_string(),
                    name: p.name.clone(),
                    stock: p.stock,
                    sold_out: p.stock == 0,
                })
                .collect(),
            product_count: report.product_count,
            customers: report.customers,
            admins: report.admins,
        }
    }
}

/// Build the report from fresh collection snapshots.
pub(crate) async fn load_report(state: &AppState) -> Result<SalesReport, AppError> {
    let data = state.data();
    let (orders, products, users) =
        tokio::try_join!(data.list_orders(), data.list_products(), data.list_users())?;

    Ok(SalesReport::build(
        &orders,
        &products,
        &users,
        state.report_options(),
    ))
}

/// Reports page template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/reports.html")]
pub struct ReportsTemplate {
    pub chrome: Chrome,
    pub report: ReportView,
    pub low_stock_threshold: u32,
}

/// Display the report.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let report = load_report(&state).await?;
    tracing::debug!(orders = report.order_count, "Report built");

    Ok(ReportsTemplate {
        chrome: Chrome::load(&state, &shopper, "/admin/reports").await?,
        report: ReportView::from(&report),
        low_stock_threshold: state.report_options().low_stock_threshold,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use verdora_core::report::ReportOptions;
    use verdora_core::{Order, Product};

    use super::*;

    #[test]
    fn test_report_view_formats_money_and_flags_sold_out() {
        let products: Vec<Product> = serde_json::from_value(serde_json::json!([
            { "id": "1", "name": "Monstera", "price": "30.00", "stock": 0 },
            { "id": "2", "name": "Pothos", "price": "10.00", "stock": 40 }
        ]))
        .unwrap();
        let orders: Vec<Order> = serde_json::from_value(serde_json::json!([{
            "id": "9",
            "userId": "1",
            "items": [{ "id": "2", "name": "Pothos", "price": "10.00", "quantity": 3 }],
            "shipping": {
                "fullName": "Ivy Green",
                "email": "ivy@example.com",
                "phone": "555",
                "address": "Canal 1",
                "city": "Amsterdam",
                "postalCode": "1011",
                "country": "NL"
            },
            "paymentMethod": "card",
            "total": "30.00",
            "status": "pending",
            "createdAt": "2026-05-01T10:00:00Z"
        }]))
        .unwrap();

        let report = SalesReport::build(&orders, &products, &[], ReportOptions::default());
        let view = ReportView::from(&report);

        assert_eq!(view.revenue, "$30.00");
        assert_eq!(view.pending, 1);
        assert_eq!(view.top_products[0].name, "Pothos");
        assert_eq!(view.daily_revenue[0].date, "2026-05-01");
        assert_eq!(view.low_stock.len(), 1);
        assert!(view.low_stock[0].sold_out);
    }
}
