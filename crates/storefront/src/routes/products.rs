//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::catalog::{self, CatalogFilter, CatalogQuery};
use verdora_core::{Product, ProductId};

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::Shopper;
use crate::routes::Chrome;
use crate::state::AppState;

/// Related products shown under a product.
const RELATED_LIMIT: usize = 4;

/// Product card data for listings.
#[derive(Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub category: String,
    pub stock: u32,
    pub in_stock: bool,
    pub rating: Option<f32>,
    pub best_selling: bool,
    pub new_arrival: bool,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.clone(),
            image: product.image.clone(),
            category: product.category.clone(),
            stock: product.stock,
            in_stock: product.in_stock(),
            rating: product.rating,
            best_selling: product.best_selling,
            new_arrival: product.new_arrival,
        }
    }
}

/// A sidebar link that narrows the listing.
pub struct FacetLink {
    pub label: String,
    pub href: String,
    pub active: bool,
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub filter: Option<String>,
    pub q: Option<String>,
    pub category: Option<String>,
}

impl ListingQuery {
    fn catalog_query(&self) -> CatalogQuery {
        CatalogQuery {
            filter: self.filter.clone(),
            search: self.q.clone(),
            category: self.category.clone(),
        }
    }

    /// Listing URL with one parameter replaced and the others kept.
    fn href_with(&self, filter: Option<&str>, category: Option<&str>) -> String {
        let params: Vec<String> = [
            ("filter", filter),
            ("q", self.q.as_deref().filter(|q| !q.trim().is_empty())),
            ("category", category),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={}", urlencoding::encode(v))))
        .collect();

        if params.is_empty() {
            "/products".to_string()
        } else {
            format!("/products?{}", params.join("&"))
        }
    }

    fn filter_links(&self) -> Vec<FacetLink> {
        let active = self.catalog_query().parsed_filter().unwrap_or(CatalogFilter::All);
        CatalogFilter::ALL
            .into_iter()
            .map(|filter| FacetLink {
                label: filter.label().to_string(),
                href: self.href_with(
                    (filter != CatalogFilter::All).then_some(filter.keyword()),
                    self.category.as_deref(),
                ),
                active: filter == active,
            })
            .collect()
    }

    fn category_links(&self, categories: Vec<String>) -> Vec<FacetLink> {
        let current = self.category.as_deref().unwrap_or_default();
        let mut links = vec![FacetLink {
            label: "All categories".to_string(),
            href: self.href_with(self.filter.as_deref(), None),
            active: current.is_empty(),
        }];
        links.extend(categories.into_iter().map(|category| FacetLink {
            href: self.href_with(self.filter.as_deref(), Some(&category)),
            active: category.eq_ignore_ascii_case(current),
            label: category,
        }));
        links
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub chrome: Chrome,
    pub products: Vec<ProductCard>,
    pub filters: Vec<FacetLink>,
    pub categories: Vec<FacetLink>,
    pub search: String,
    pub filter: String,
    pub category: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub chrome: Chrome,
    pub product: ProductCard,
    pub description: String,
    pub attributes: Vec<(&'static str, String)>,
    pub in_cart: u32,
    pub in_wishlist: bool,
    pub related: Vec<ProductCard>,
}

/// Display product listing page.
#[instrument(skip(state, shopper))]
pub async fn index(
    State(state): State<AppState>,
    shopper: Shopper,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let products = state.data().list_products().await?;
    let categories = catalog::categories(&products);
    let shown = query.catalog_query().run(products.as_ref().clone());

    Ok(ProductsIndexTemplate {
        chrome: Chrome::load(&state, &shopper, "/products").await?,
        products: shown.iter().map(ProductCard::from).collect(),
        filters: query.filter_links(),
        categories: query.category_links(categories),
        search: query.q.clone().unwrap_or_default(),
        filter: query.filter.clone().unwrap_or_default(),
        category: query.category.clone().unwrap_or_default(),
    })
}

/// Display product detail page.
#[instrument(skip(state, shopper))]
pub async fn show(
    State(state): State<AppState>,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = ProductId::new(id);
    let product = state
        .data()
        .get_product(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    add_breadcrumb("navigation", "Viewed product", Some(&[("product_id", id.as_str())][..]));

    let catalog = state.data().list_products().await?;
    let related = catalog::related(&catalog, &product, RELATED_LIMIT)
        .into_iter()
        .map(ProductCard::from)
        .collect();

    let cart = state.store().load_cart(&shopper.owner).await?;
    let wishlist = state.store().load_wishlist(&shopper.owner).await?;

    Ok(ProductShowTemplate {
        chrome: Chrome::load(&state, &shopper, "/products").await?,
        in_cart: cart.quantity_of(&product.id),
        in_wishlist: wishlist.contains(&product.id),
        description: product.description.clone(),
        attributes: product.care.attributes(),
        product: ProductCard::from(&product),
        related,
    })
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_href_keeps_search_term() {
        let query = ListingQuery {
            filter: Some("inStock".to_string()),
            q: Some("fern leaf".to_string()),
            category: None,
        };
        assert_eq!(
            query.href_with(Some("nameAZ"), Some("Ferns")),
            "/products?filter=nameAZ&q=fern%20leaf&category=Ferns"
        );
        assert_eq!(query.href_with(None, None), "/products?q=fern%20leaf");
    }

    #[test]
    fn test_unknown_filter_highlights_all() {
        let query = ListingQuery {
            filter: Some("mystery".to_string()),
            ..ListingQuery::default()
        };
        let active: Vec<String> = query
            .filter_links()
            .into_iter()
            .filter(|link| link.active)
            .map(|link| link.label)
            .collect();
        assert_eq!(active, vec![CatalogFilter::All.label().to_string()]);
    }

    #[test]
    fn test_category_links_mark_current() {
        let query = ListingQuery {
            category: Some("succulents".to_string()),
            ..ListingQuery::default()
        };
        let links = query.category_links(vec!["Ferns".to_string(), "Succulents".to_string()]);
        assert_eq!(links.len(), 3);
        assert!(!links[0].active);
        assert!(links[2].active);
        assert_eq!(links[2].href, "/products?category=Succulents");
    }
}
