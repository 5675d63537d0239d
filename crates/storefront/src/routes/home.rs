//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use verdora_core::{CatalogFilter, Product};

use crate::error::AppError;
use crate::filters;
use crate::middleware::Shopper;
use crate::routes::Chrome;
use crate::routes::products::ProductCard;
use crate::state::AppState;

/// Cards per home page shelf.
const SHELF_SIZE: usize = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub best_sellers: Vec<ProductCard>,
    pub new_arrivals: Vec<ProductCard>,
}

fn shelf(products: &[Product], filter: CatalogFilter) -> Vec<ProductCard> {
    filter
        .apply(products.to_vec())
        .iter()
        .take(SHELF_SIZE)
        .map(ProductCard::from)
        .collect()
}

/// Display the home page.
#[instrument(skip(state, shopper))]
pub async fn home(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    // The page still renders without shelves if the catalog is unreachable.
    let (best_sellers, new_arrivals) = match state.data().list_products().await {
        Ok(products) => (
            shelf(&products, CatalogFilter::BestSelling),
            shelf(&products, CatalogFilter::NewArrivals),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load catalog for home page");
            (Vec::new(), Vec::new())
        }
    };

    Ok(HomeTemplate {
        chrome: Chrome::load(&state, &shopper, "/").await?,
        best_sellers,
        new_arrivals,
    })
}
