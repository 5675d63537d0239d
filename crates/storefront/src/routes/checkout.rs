//! Checkout route handlers.
//!
//! Two steps and a confirmation: shipping details, then the payment method,
//! which places the order. Both steps bounce back to the cart when it is
//! empty, so an empty cart never reaches payment.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::{Cart, FieldErrors, OrderId, PaymentMethod, ShippingForm};

use crate::error::{AppError, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequireAuth, Shopper};
use crate::models::{CheckoutDraft, CurrentUser, Flash, session_keys};
use crate::routes::account::OrderView;
use crate::routes::cart::CartView;
use crate::routes::forms::{ChoiceView, FieldView};
use crate::routes::{Chrome, redirect_with};
use crate::services::{CheckoutError, CheckoutService, OrderService};
use crate::state::AppState;

/// Toast shown when checkout is attempted with nothing in the cart.
pub const EMPTY_CART_MESSAGE: &str = "Your cart is empty";

/// Payment step form data.
#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    pub payment_method: String,
}

/// Shipping step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/shipping.html")]
pub struct ShippingTemplate {
    pub chrome: Chrome,
    pub fields: Vec<FieldView>,
    pub cart: CartView,
}

/// Payment step template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/payment.html")]
pub struct PaymentTemplate {
    pub chrome: Chrome,
    pub ship_to: Vec<String>,
    pub methods: Vec<ChoiceView>,
    pub cart: CartView,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub chrome: Chrome,
    pub order: OrderView,
}

fn shipping_fields(form: &ShippingForm, errors: &FieldErrors) -> Vec<FieldView> {
    vec![
        FieldView::new("full_name", "Full name", "text", &form.full_name, errors),
        FieldView::new("email", "Email", "email", &form.email, errors),
        FieldView::new("phone", "Phone", "tel", &form.phone, errors),
        FieldView::new("address", "Address", "text", &form.address, errors),
        FieldView::new("city", "City", "text", &form.city, errors),
        FieldView::new("postal_code", "Postal code", "text", &form.postal_code, errors),
        FieldView::new("country", "Country", "text", &form.country, errors),
    ]
}

fn payment_choices(selected: PaymentMethod) -> Vec<ChoiceView> {
    PaymentMethod::ALL
        .into_iter()
        .map(|method| ChoiceView {
            value: method.as_str(),
            label: method.label(),
            selected: method == selected,
        })
        .collect()
}

/// First visit: the user's own name and email.
fn prefill(user: &CurrentUser) -> ShippingForm {
    ShippingForm {
        full_name: user.name.clone(),
        email: user.email.to_string(),
        ..ShippingForm::default()
    }
}

async fn load_draft(shopper: &Shopper) -> Option<CheckoutDraft> {
    shopper
        .session
        .get::<CheckoutDraft>(session_keys::CHECKOUT)
        .await
        .ok()
        .flatten()
}

/// The user's cart, or `None` when it is empty.
async fn non_empty_cart(state: &AppState, shopper: &Shopper) -> Result<Option<Cart>, AppError> {
    let cart = state.store().load_cart(&shopper.owner).await?;
    Ok((!cart.is_empty()).then_some(cart))
}

async fn back_to_cart(shopper: &Shopper) -> Response {
    redirect_with(&shopper.session, Flash::error(EMPTY_CART_MESSAGE), "/cart")
        .await
        .into_response()
}

/// Display the shipping form.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn shipping_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    shopper: Shopper,
) -> Result<Response, AppError> {
    let Some(cart) = non_empty_cart(&state, &shopper).await? else {
        return Ok(back_to_cart(&shopper).await);
    };

    let form = load_draft(&shopper)
        .await
        .map_or_else(|| prefill(&user), |draft| ShippingForm::from(&draft.shipping));

    Ok(ShippingTemplate {
        chrome: Chrome::load(&state, &shopper, "/checkout").await?,
        fields: shipping_fields(&form, &FieldErrors::new()),
        cart: CartView::from(&cart),
    }
    .into_response())
}

/// Validate the shipping form and continue to payment.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn shipping(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    shopper: Shopper,
    Form(form): Form<ShippingForm>,
) -> Result<Response, AppError> {
    let Some(cart) = non_empty_cart(&state, &shopper).await? else {
        return Ok(back_to_cart(&shopper).await);
    };

    match form.validate() {
        Ok(shipping) => {
            let payment_method = load_draft(&shopper).await.and_then(|d| d.payment_method);
            shopper
                .session
                .insert(
                    session_keys::CHECKOUT,
                    CheckoutDraft {
                        shipping,
                        payment_method,
                    },
                )
                .await?;
            Ok(Redirect::to("/checkout/payment").into_response())
        }
        Err(errors) => {
            tracing::debug!(failed = errors.len(), "Shipping form rejected");
            let page = ShippingTemplate {
                chrome: Chrome::load(&state, &shopper, "/checkout").await?,
                fields: shipping_fields(&form, &errors),
                cart: CartView::from(&cart),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

/// Display the payment step.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn payment_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    shopper: Shopper,
) -> Result<Response, AppError> {
    let Some(cart) = non_empty_cart(&state, &shopper).await? else {
        return Ok(back_to_cart(&shopper).await);
    };
    let Some(draft) = load_draft(&shopper).await else {
        return Ok(redirect_with(
            &shopper.session,
            Flash::info("Enter your shipping details first"),
            "/checkout",
        )
        .await
        .into_response());
    };

    let shipping = &draft.shipping;
    Ok(PaymentTemplate {
        chrome: Chrome::load(&state, &shopper, "/checkout").await?,
        ship_to: vec![
            shipping.full_name.clone(),
            shipping.address.clone(),
            format!("{} {}", shipping.postal_code, shipping.city),
            shipping.country.clone(),
        ],
        methods: payment_choices(draft.payment_method.unwrap_or_default()),
        cart: CartView::from(&cart),
    }
    .into_response())
}

/// Place the order.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    shopper: Shopper,
    Form(form): Form<PaymentForm>,
) -> Result<Redirect, AppError> {
    if non_empty_cart(&state, &shopper).await?.is_none() {
        return Ok(redirect_with(&shopper.session, Flash::error(EMPTY_CART_MESSAGE), "/cart").await);
    }
    let Some(draft) = load_draft(&shopper).await else {
        return Ok(redirect_with(
            &shopper.session,
            Flash::info("Enter your shipping details first"),
            "/checkout",
        )
        .await);
    };
    let Ok(payment_method) = form.payment_method.parse::<PaymentMethod>() else {
        return Ok(redirect_with(
            &shopper.session,
            Flash::error("Choose a payment method"),
            "/checkout/payment",
        )
        .await);
    };

    let checkout = CheckoutService::new(state.data(), state.store());
    let result = checkout
        .place_order(&user.id, draft.shipping, payment_method, chrono::Utc::now())
        .await;

    match result {
        Ok(order) => {
            shopper
                .session
                .remove::<CheckoutDraft>(session_keys::CHECKOUT)
                .await?;
            add_breadcrumb(
                "checkout",
                "Order placed",
                Some(&[("order_id", order.id.as_str())][..]),
            );
            Ok(redirect_with(
                &shopper.session,
                Flash::success("Thank you! Your order has been placed"),
                &format!("/checkout/confirmation/{}", order.id),
            )
            .await)
        }
        Err(CheckoutError::EmptyCart) => Ok(redirect_with(
            &shopper.session,
            Flash::error(EMPTY_CART_MESSAGE),
            "/cart",
        )
        .await),
        Err(e @ (CheckoutError::OutOfStock { .. } | CheckoutError::ProductMissing { .. })) => {
            let message = AppError::from(e).public_message();
            Ok(redirect_with(&shopper.session, Flash::error(message), "/cart").await)
        }
        Err(e) => Err(e.into()),
    }
}

/// Display the confirmation for a just-placed order.
#[instrument(skip(state, user, shopper))]
pub async fn confirmation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    shopper: Shopper,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let order = OrderService::new(state.data())
        .get_for_customer(&user.id, &OrderId::new(id))
        .await?;

    Ok(ConfirmationTemplate {
        chrome: Chrome::load(&state, &shopper, "/checkout").await?,
        order: OrderView::from(&order),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use verdora_core::{Email, Role, UserId};

    use super::*;

    #[test]
    fn test_prefill_uses_account_details() {
        let user = CurrentUser {
            id: UserId::new("3"),
            name: "Fern Gully".to_string(),
            email: Email::parse("fern@example.com").unwrap(),
            role: Role::User,
        };
        let form = prefill(&user);
        assert_eq!(form.full_name, "Fern Gully");
        assert_eq!(form.email, "fern@example.com");
        assert!(form.city.is_empty());
    }

    #[test]
    fn test_shipping_fields_carry_errors() {
        let form = ShippingForm::default();
        let errors = form.validate().unwrap_err();
        let fields = shipping_fields(&form, &errors);
        assert_eq!(fields.len(), 7);
        assert!(fields.iter().all(|f| f.error.is_some()));
    }

    #[test]
    fn test_payment_choices_select_one() {
        let choices = payment_choices(PaymentMethod::Paypal);
        let selected: Vec<&str> = choices
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.value)
            .collect();
        assert_eq!(selected, vec!["paypal"]);
    }
}
