//! Cart route handlers.
//!
//! Carts belong to the current [`Owner`](crate::store::Owner): the signed-in
//! user, or the session's guest id. Every change is published on the store's
//! event channel, which `/cart/events` relays to the shopper's open tabs.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::State,
    response::{
        IntoResponse, Redirect, Sse,
        sse::{Event, KeepAlive},
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::instrument;

use verdora_core::{Cart, CartItem, Product, ProductId};

use crate::error::AppError;
use crate::filters;
use crate::middleware::{Shopper, auth::is_local_path};
use crate::models::Flash;
use crate::routes::{Chrome, redirect_with};
use crate::state::AppState;
use crate::store::{Namespace, StorageKey};

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub id: String,
    pub name: String,
    pub image: String,
    pub price: String,
    pub quantity: u32,
    pub line_total: String,
}

impl From<&CartItem> for CartLineView {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.product.id.to_string(),
            name: item.product.name.clone(),
            image: item.product.image.clone(),
            price: item.product.unit_price().to_string(),
            quantity: item.quantity,
            line_total: item.line_total().to_string(),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: String,
    pub item_count: u32,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(CartLineView::from).collect(),
            subtotal: cart.subtotal().to_string(),
            item_count: cart.item_count(),
        }
    }
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<u32>,
    /// Page to go back to; defaults to the cart.
    pub return_to: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
}

/// Badge counts.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub cart: u32,
    pub wishlist: usize,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub chrome: Chrome,
    pub cart: CartView,
}

/// Where to send the shopper after a cart form.
pub(crate) fn return_path(requested: Option<&str>, default: &str) -> String {
    requested
        .filter(|path| is_local_path(path))
        .unwrap_or(default)
        .to_string()
}

/// How many more units of `product` the cart may take.
fn room_for(cart: &Cart, product: &Product) -> u32 {
    product.stock.saturating_sub(cart.quantity_of(&product.id))
}

/// Display cart page.
#[instrument(skip(state, shopper))]
pub async fn show(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    let cart = state.store().load_cart(&shopper.owner).await?;

    Ok(CartShowTemplate {
        chrome: Chrome::load(&state, &shopper, "/cart").await?,
        cart: CartView::from(&cart),
    })
}

/// Add a product to the cart.
///
/// The quantity is capped at the stock the catalog reports right now.
#[instrument(skip(state, shopper))]
pub async fn add(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect, AppError> {
    let back = return_path(form.return_to.as_deref(), "/cart");
    let id = ProductId::new(form.product_id);

    let Some(product) = state.data().get_product(&id).await? else {
        return Ok(redirect_with(
            &shopper.session,
            Flash::error("That plant is no longer available"),
            &back,
        )
        .await);
    };

    if !product.in_stock() {
        let message = format!("{} is out of stock", product.name);
        return Ok(redirect_with(&shopper.session, Flash::error(message), &back).await);
    }

    let cart = state.store().load_cart(&shopper.owner).await?;
    let room = room_for(&cart, &product);
    if room == 0 {
        let message = format!(
            "Your cart already holds all {} available {}",
            product.stock, product.name
        );
        return Ok(redirect_with(&shopper.session, Flash::info(message), &back).await);
    }

    let requested = form.quantity.unwrap_or(1).max(1);
    let quantity = requested.min(room);
    let name = product.name.clone();
    state
        .store()
        .update_cart(&shopper.owner, |cart| cart.add(product, quantity))
        .await?;

    let flash = if quantity < requested {
        Flash::info(format!("Only {quantity} more {name} could be added"))
    } else {
        Flash::success(format!("{name} added to your cart"))
    };
    Ok(redirect_with(&shopper.session, flash, &back).await)
}

/// Set the quantity of a cart line. Zero removes the line.
///
/// Like [`add`], the quantity is capped at the stock the catalog reports;
/// a product that has left the catalog is dropped from the cart.
#[instrument(skip(state, shopper))]
pub async fn update(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<UpdateCartForm>,
) -> Result<Redirect, AppError> {
    let id = ProductId::new(form.product_id);
    let (quantity, name) = match state.data().get_product(&id).await? {
        Some(product) => (form.quantity.min(product.stock), Some(product.name)),
        None => (0, None),
    };

    let found = state
        .store()
        .update_cart(&shopper.owner, |cart| cart.set_quantity(&id, quantity))
        .await?;

    if !found {
        return Ok(redirect_with(
            &shopper.session,
            Flash::error("That item is not in your cart"),
            "/cart",
        )
        .await);
    }
    let flash = match name {
        Some(name) if quantity < form.quantity => {
            Flash::info(format!("Only {quantity} {name} in stock"))
        }
        Some(_) => return Ok(Redirect::to("/cart")),
        None => Flash::error("That plant is no longer available"),
    };
    Ok(redirect_with(&shopper.session, flash, "/cart").await)
}

/// Remove a cart line.
#[instrument(skip(state, shopper))]
pub async fn remove(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Redirect, AppError> {
    let id = ProductId::new(form.product_id);
    let removed = state
        .store()
        .update_cart(&shopper.owner, |cart| {
            let name = cart
                .items()
                .iter()
                .find(|item| item.product.id == id)
                .map(|item| item.product.name.clone());
            cart.remove(&id);
            name
        })
        .await?;

    if let Some(name) = removed {
        Flash::info(format!("{name} removed from your cart"))
            .push(&shopper.session)
            .await;
    }
    Ok(Redirect::to("/cart"))
}

/// Empty the cart.
#[instrument(skip(state, shopper))]
pub async fn clear(State(state): State<AppState>, shopper: Shopper) -> Result<Redirect, AppError> {
    state.store().clear_cart(&shopper.owner).await?;
    Ok(redirect_with(&shopper.session, Flash::info("Your cart is now empty"), "/cart").await)
}

/// Badge counts for the cart and wishlist.
pub async fn count(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<Json<CountResponse>, AppError> {
    let cart = state.store().load_cart(&shopper.owner).await?;
    let wishlist = state.store().load_wishlist(&shopper.owner).await?;

    Ok(Json(CountResponse {
        cart: cart.item_count(),
        wishlist: wishlist.len(),
    }))
}

/// Stream changes to the shopper's cart and wishlist as server-sent events.
///
/// Events are named `cart` or `wishlist` and carry the new count. Other
/// shoppers' changes are never sent.
pub async fn events(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let watched = [
        StorageKey::new(Namespace::Cart, &shopper.owner),
        StorageKey::new(Namespace::Wishlist, &shopper.owner),
    ];
    let mut receiver = state.store().subscribe();

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) if watched.contains(&event.key) => {
                    let json = serde_json::to_string(&event)
                        .unwrap_or_else(|_| r#"{"count":0}"#.to_string());
                    yield Ok(Event::default().event(event.kind.as_str()).data(json));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Store event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
