//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                                - Home page
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (pings the data endpoint)
//!
//! # Catalog
//! GET  /products?filter=&q=&category=   - Product listing
//! GET  /products/{id}                   - Product detail
//!
//! # Cart
//! GET  /cart                            - Cart page
//! POST /cart/add                        - Add a product
//! POST /cart/update                     - Set a line quantity (0 removes)
//! POST /cart/remove                     - Remove a line
//! POST /cart/clear                      - Empty the cart
//! GET  /cart/count                      - Badge counts (JSON)
//! GET  /cart/events                     - Cart/wishlist changes (SSE)
//!
//! # Wishlist
//! GET  /wishlist                        - Wishlist page
//! POST /wishlist/add                    - Save a product
//! POST /wishlist/remove                 - Drop a saved product
//! POST /wishlist/move-to-cart           - Move a saved product to the cart
//!
//! # Checkout (requires auth)
//! GET  /checkout                        - Shipping form
//! POST /checkout                        - Validate shipping details
//! GET  /checkout/payment                - Payment method
//! POST /checkout/payment                - Place the order
//! GET  /checkout/confirmation/{id}      - Order confirmation
//!
//! # Account (requires auth)
//! GET  /account                         - Profile
//! POST /account                         - Update display name
//! GET  /account/orders                  - Order history
//! GET  /account/orders/{id}             - Order detail
//! POST /account/orders/{id}/cancel      - Cancel a pending/confirmed order
//!
//! # Auth (POSTs are rate limited)
//! GET|POST /auth/login
//! GET|POST /auth/register
//! POST     /auth/logout
//! GET|POST /auth/forgot-password
//! GET|POST /auth/reset-password
//!
//! # Back-office (requires role = admin)
//! /admin/...                            - See [`admin`]
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod forms;
pub mod home;
pub mod products;
pub mod wishlist;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    response::Redirect,
    routing::{get, post},
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, Session};
use tower_sessions_sqlx_store::PostgresStore;

use crate::error::AppError;
use crate::middleware::{
    Shopper, auth_rate_limiter, create_session_layer, request_id_middleware,
    security_headers_middleware,
};
use crate::models::{CurrentUser, Flash};
use crate::state::AppState;

// =============================================================================
// Page Chrome
// =============================================================================

/// Data every full page needs for the header: who is signed in, badge
/// counts and the pending toast.
pub struct Chrome {
    pub user: Option<CurrentUser>,
    pub cart_count: u32,
    pub wishlist_count: usize,
    pub flash: Option<Flash>,
    /// Path used to highlight the active navigation link.
    pub current_path: &'static str,
}

impl Chrome {
    /// Load the chrome for the current shopper. Takes the pending toast.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart or wishlist cannot be read.
    pub async fn load(
        state: &AppState,
        shopper: &Shopper,
        current_path: &'static str,
    ) -> Result<Self, AppError> {
        let cart = state.store().load_cart(&shopper.owner).await?;
        let wishlist = state.store().load_wishlist(&shopper.owner).await?;

        Ok(Self {
            user: shopper.user.clone(),
            cart_count: cart.item_count(),
            wishlist_count: wishlist.len(),
            flash: Flash::take(&shopper.session).await,
            current_path,
        })
    }

    /// Whether the signed-in user may see the back-office link.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(CurrentUser::is_admin)
    }
}

/// Queue a toast and redirect.
pub async fn redirect_with(session: &Session, flash: Flash, to: &str) -> Redirect {
    flash.push(session).await;
    Redirect::to(to)
}

// =============================================================================
// Routers
// =============================================================================

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
        .route("/events", get(cart::events))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/add", post(wishlist::add))
        .route("/remove", post(wishlist::remove))
        .route("/move-to-cart", post(wishlist::move_to_cart))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::shipping_page).post(checkout::shipping))
        .route(
            "/payment",
            get(checkout::payment_page).post(checkout::place_order),
        )
        .route("/confirmation/{id}", get(checkout::confirmation))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index).post(account::update_profile))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order_detail))
        .route("/orders/{id}/cancel", post(account::cancel_order))
}

/// Create the auth routes router.
///
/// Form posts go through the per-IP rate limiter; the pages do not.
pub fn auth_routes(auth_burst: u32) -> Router<AppState> {
    let pages = Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/reset-password", get(auth::reset_password_page));

    let actions = Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .layer(auth_rate_limiter(auth_burst));

    pages
        .merge(actions)
        .route("/logout", post(auth::logout))
}

/// Create all page routes for the storefront.
pub fn routes(auth_burst: u32) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/checkout", checkout_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes(auth_burst))
        .nest("/admin", admin::routes())
}

/// Build the complete application: routes, static files and the middleware
/// stack.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes(state.config().auth_burst))
        .nest_service(
            "/static",
            ServeDir::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        );

    let router = match state.pool() {
        Some(pool) => router.layer(create_session_layer(
            PostgresStore::new(pool.clone()),
            state.config(),
        )),
        None => router.layer(create_session_layer(MemoryStore::default(), state.config())),
    };

    router
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the data endpoint is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.data().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::config::StorefrontConfig;

    fn test_app() -> Router {
        let config = StorefrontConfig::local("http://127.0.0.1:9/".parse().unwrap());
        app(AppState::new(config, None).unwrap())
    }

    #[tokio::test]
    async fn test_health_is_served_with_security_headers() {
        let response = test_app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert!(response.headers().contains_key("x-request-id"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_readiness_reports_unreachable_data_endpoint() {
        let response = test_app()
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
