//! Wishlist route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::{ProductId, WishlistItem};

use crate::error::AppError;
use crate::filters;
use crate::middleware::Shopper;
use crate::models::Flash;
use crate::routes::cart::return_path;
use crate::routes::{Chrome, redirect_with};
use crate::state::AppState;

/// Wishlist form data.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: String,
    pub return_to: Option<String>,
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/show.html")]
pub struct WishlistShowTemplate {
    pub chrome: Chrome,
    pub items: Vec<WishlistItem>,
}

/// Display the wishlist.
#[instrument(skip(state, shopper))]
pub async fn show(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let wishlist = state.store().load_wishlist(&shopper.owner).await?;

    Ok(WishlistShowTemplate {
        chrome: Chrome::load(&state, &shopper, "/wishlist").await?,
        items: wishlist.items().to_vec(),
    })
}

/// Save a product for later.
#[instrument(skip(state, shopper))]
pub async fn add(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect, AppError> {
    let back = return_path(form.return_to.as_deref(), "/wishlist");
    let id = ProductId::new(form.product_id);

    let Some(product) = state.data().get_product(&id).await? else {
        return Ok(redirect_with(
            &shopper.session,
            Flash::error("That plant is no longer available"),
            &back,
        )
        .await);
    };

    let item = WishlistItem::from(&product);
    let added = state
        .store()
        .update_wishlist(&shopper.owner, |wishlist| wishlist.add(item))
        .await?;

    let flash = if added {
        Flash::success(format!("{} saved to your wishlist", product.name))
    } else {
        Flash::info(format!("{} is already in your wishlist", product.name))
    };
    Ok(redirect_with(&shopper.session, flash, &back).await)
}

/// Drop a saved product.
#[instrument(skip(state, shopper))]
pub async fn remove(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect, AppError> {
    let back = return_path(form.return_to.as_deref(), "/wishlist");
    let id = ProductId::new(form.product_id);
    state
        .store()
        .update_wishlist(&shopper.owner, |wishlist| wishlist.remove(&id))
        .await?;
    Ok(Redirect::to(&back))
}

/// Move a saved product into the cart.
///
/// The product is looked up again because the wishlist entry is only a
/// snapshot; a product that is gone or sold out stays on the wishlist.
#[instrument(skip(state, shopper))]
pub async fn move_to_cart(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect, AppError> {
    let id = ProductId::new(form.product_id);

    let product = match state.data().get_product(&id).await? {
        Some(product) if product.in_stock() => product,
        Some(product) => {
            let message = format!("{} is out of stock", product.name);
            return Ok(redirect_with(&shopper.session, Flash::error(message), "/wishlist").await);
        }
        None => {
            return Ok(redirect_with(
                &shopper.session,
                Flash::error("That plant is no longer available"),
                "/wishlist",
            )
            .await);
        }
    };

    let name = product.name.clone();
    state
        .store()
        .update_cart(&shopper.owner, |cart| cart.add(product, 1))
        .await?;
    state
        .store()
        .update_wishlist(&shopper.owner, |wishlist| wishlist.remove(&id))
        .await?;

    Ok(redirect_with(
        &shopper.session,
        Flash::success(format!("{name} moved to your cart")),
        "/wishlist",
    )
    .await)
}
