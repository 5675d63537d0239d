//! Back-office route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin):
//! anonymous visitors are sent to the login page and signed-in customers
//! get a 403.
//!
//! # Route Structure
//!
//! ```text
//! GET  /admin                          - Dashboard
//!
//! # Products
//! GET  /admin/products                 - Product listing
//! GET  /admin/products/new             - New product form
//! POST /admin/products                 - Create product
//! GET  /admin/products/{id}/edit       - Edit product form
//! POST /admin/products/{id}            - Update product
//! POST /admin/products/{id}/delete     - Delete product
//!
//! # Orders
//! GET  /admin/orders?status=           - Order listing
//! GET  /admin/orders/{id}              - Order detail
//! POST /admin/orders/{id}/status       - Move the order along
//! POST /admin/orders/{id}/delete       - Delete order
//!
//! # Users
//! GET  /admin/users                    - User listing
//! POST /admin/users/{id}/role          - Change role
//! POST /admin/users/{id}/delete        - Delete user
//!
//! # Reports
//! GET  /admin/reports                  - Sales and inventory report
//! ```

pub mod dashboard;
pub mod orders;
pub mod products;
pub mod reports;
pub mod users;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the back-office router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route("/products", get(products::index).post(products::create))
        .route("/products/new", get(products::new_page))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit_page))
        .route("/products/{id}/delete", post(products::delete))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/orders/{id}/delete", post(orders::delete))
        .route("/users", get(users::index))
        .route("/users/{id}/role", post(users::update_role))
        .route("/users/{id}/delete", post(users::delete))
        .route("/reports", get(reports::index))
}
