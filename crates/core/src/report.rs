//! Aggregations behind the admin reports page and dashboard.
//!
//! Everything is computed in memory from full collection fetches. Cancelled
//! orders are counted per status but excluded from revenue and units sold.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::catalog::Product;
use crate::order::Order;
use crate::types::{OrderStatus, Price, ProductId, Role};
use crate::user::User;

/// Knobs for [`SalesReport::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Products at or below this stock level are listed as low stock.
    pub low_stock_threshold: u32,
    /// How many best-selling products to list.
    pub top_products: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            low_stock_threshold: 5,
            top_products: 5,
        }
    }
}

/// Units and revenue for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    pub id: ProductId,
    pub name: String,
    pub units: u32,
    pub revenue: Price,
}

/// Revenue booked on one calendar day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub orders: usize,
    pub revenue: Price,
}

/// A product running out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStock {
    pub id: ProductId,
    pub name: String,
    pub stock: u32,
}

/// The full report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesReport {
    pub revenue: Price,
    pub order_count: usize,
    /// Orders that count towards revenue (everything but cancelled).
    pub billable_orders: usize,
    pub average_order_value: Price,
    pub by_status: Vec<(OrderStatus, usize)>,
    pub top_products: Vec<ProductSales>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub low_stock: Vec<LowStock>,
    pub product_count: usize,
    pub customers: usize,
    pub admins: usize,
}

impl SalesReport {
    /// Build the report from full collection snapshots.
    #[must_use]
    pub fn build(
        orders: &[Order],
        products: &[Product],
        users: &[User],
        options: ReportOptions,
    ) -> Self {
        let billable: Vec<&Order> = orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .collect();

        let revenue: Price = billable.iter().map(|o| o.total).sum();
        let average_order_value = match Decimal::from(billable.len()) {
            n if n.is_zero() => Price::ZERO,
            n => Price::new((revenue.amount() / n).round_dp(2)),
        };

        let by_status = OrderStatus::ALL
            .into_iter()
            .map(|status| (status, orders.iter().filter(|o| o.status == status).count()))
            .collect();

        let mut sales: HashMap<&ProductId, ProductSales> = HashMap::new();
        for item in billable.iter().flat_map(|o| &o.items) {
            let entry = sales.entry(&item.product.id).or_insert_with(|| ProductSales {
                id: item.product.id.clone(),
                name: item.product.name.clone(),
                units: 0,
                revenue: Price::ZERO,
            });
            entry.units = entry.units.saturating_add(item.quantity);
            entry.revenue = entry.revenue + item.line_total();
        }
        let mut top_products: Vec<ProductSales> = sales.into_values().collect();
        top_products.sort_by(|a, b| b.units.cmp(&a.units).then_with(|| a.name.cmp(&b.name)));
        top_products.truncate(options.top_products);

        let mut days: BTreeMap<NaiveDate, DailyRevenue> = BTreeMap::new();
        for order in &billable {
            let date = order.created_at.date_naive();
            let day = days.entry(date).or_insert(DailyRevenue {
                date,
                orders: 0,
                revenue: Price::ZERO,
            });
            day.orders += 1;
            day.revenue = day.revenue + order.total;
        }

        let mut low_stock: Vec<LowStock> = products
            .iter()
            .filter(|p| p.stock <= options.low_stock_threshold)
            .map(|p| LowStock {
                id: p.id.clone(),
                name: p.name.clone(),
                stock: p.stock,
            })
            .collect();
        low_stock.sort_by_key(|p| p.stock);

        Self {
            revenue,
            order_count: orders.len(),
            billable_orders: billable.len(),
            average_order_value,
            by_status,
            top_products,
            daily_revenue: days.into_values().collect(),
            low_stock,
            product_count: products.len(),
            customers: users.iter().filter(|u| u.role == Role::User).count(),
            admins: users.iter().filter(|u| u.role == Role::Admin).count(),
        }
    }

    /// Count for a single status.
    #[must_use]
    pub fn count_for(&self, status: OrderStatus) -> usize {
        self.by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map_or(0, |(_, n)| *n)
    }
}
