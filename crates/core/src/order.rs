//! Orders, shipping details and status transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{Cart, CartItem};
use crate::types::{Email, OrderId, OrderStatus, PaymentMethod, Price, UserId};
use crate::validation::FieldErrors;

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Raw shipping form as submitted by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

impl ShippingForm {
    /// Validate every field.
    ///
    /// # Errors
    ///
    /// Returns one message per failing field; nothing is partially accepted.
    pub fn validate(&self) -> Result<ShippingInfo, FieldErrors> {
        let mut errors = FieldErrors::new();

        let full_name = errors.require("full_name", &self.full_name, "Full name is required");
        let address = errors.require("address", &self.address, "Address is required");
        let city = errors.require("city", &self.city, "City is required");
        let country = errors.require("country", &self.country, "Country is required");

        let email = match errors.require("email", &self.email, "Email is required") {
            "" => None,
            raw => Email::parse(raw)
                .map_err(|_| errors.add("email", "Enter a valid email address"))
                .ok(),
        };

        let phone = errors.require("phone", &self.phone, "Phone number is required");
        if !phone.is_empty() && !is_valid_phone(phone) {
            errors.add("phone", "Enter a valid phone number");
        }

        let postal_code = errors.require("postal_code", &self.postal_code, "Postal code is required");
        if !postal_code.is_empty() && !is_valid_postal_code(postal_code) {
            errors.add("postal_code", "Enter a valid postal code");
        }

        match email {
            Some(email) if errors.is_empty() => Ok(ShippingInfo {
                full_name: full_name.to_owned(),
                email,
                phone: phone.to_owned(),
                address: address.to_owned(),
                city: city.to_owned(),
                postal_code: postal_code.to_owned(),
                country: country.to_owned(),
            }),
            _ => Err(errors),
        }
    }
}

impl From<&ShippingInfo> for ShippingForm {
    fn from(info: &ShippingInfo) -> Self {
        Self {
            full_name: info.full_name.clone(),
            email: info.email.to_string(),
            phone: info.phone.clone(),
            address: info.address.clone(),
            city: info.city.clone(),
            postal_code: info.postal_code.clone(),
            country: info.country.clone(),
        }
    }
}

fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    allowed && (7..=20).contains(&phone.len()) && digits >= 7
}

fn is_valid_postal_code(code: &str) -> bool {
    (3..=10).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-'))
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Snapshot of the cart at checkout.
    pub items: Vec<CartItem>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub total: Price,
    #[serde(default)]
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("order cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl Order {
    /// Move to `to` if the transition table allows it.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` when `to` is not reachable from the current
    /// status in one step (including "moving" to the same status).
    pub fn transition(&mut self, to: OrderStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Total number of units ordered.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |total: u32, i| total.saturating_add(i.quantity))
    }
}

/// Payload for creating an order (everything but the id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub shipping: ShippingInfo,
    pub payment_method: PaymentMethod,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Snapshot a cart into a `pending` order.
    #[must_use]
    pub fn from_cart(
        user_id: UserId,
        cart: &Cart,
        shipping: ShippingInfo,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            items: cart.items().to_vec(),
            shipping,
            payment_method,
            total: cart.subtotal(),
            status: OrderStatus::Pending,
            created_at: now,
        }
    }

    /// Attach an id, producing the full record.
    #[must_use]
    pub fn with_id(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            items: self.items,
            shipping: self.shipping,
            payment_method: self.payment_method,
            total: self.total,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::tests::product;

    pub fn valid_form() -> ShippingForm {
        ShippingForm {
            full_name: "Hazel Moss".to_owned(),
            email: "hazel@example.com".to_owned(),
            phone: "+1 (555) 010-2030".to_owned(),
            address: "12 Greenhouse Lane".to_owned(),
            city: "Portland".to_owned(),
            postal_code: "97201".to_owned(),
            country: "USA".to_owned(),
        }
    }

    pub fn order_with_status(status: OrderStatus) -> Order {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "10"), 2);
        let mut order = NewOrder::from_cart(
            UserId::new("u1"),
            &cart,
            valid_form().validate().unwrap(),
            PaymentMethod::Card,
            Utc::now(),
        )
        .with_id(OrderId::new("o1"));
        order.status = status;
        order
    }

    #[test]
    fn test_valid_form_passes() {
        let info = valid_form().validate().unwrap();
        assert_eq!(info.full_name, "Hazel Moss");
        assert_eq!(info.email.as_str(), "hazel@example.com");
    }

    #[test]
    fn test_empty_form_reports_every_field() {
        let errors = ShippingForm::default().validate().unwrap_err();
        for field in [
            "full_name",
            "email",
            "phone",
            "address",
            "city",
            "postal_code",
            "country",
        ] {
            assert!(errors.has(field), "missing error for {field}");
        }
    }

    #[test]
    fn test_format_errors() {
        let form = ShippingForm {
            email: "not-an-email".to_owned(),
            phone: "12ab".to_owned(),
            postal_code: "!".to_owned(),
            ..valid_form()
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Enter a valid email address"));
        assert_eq!(errors.get("phone"), Some("Enter a valid phone number"));
        assert_eq!(errors.get("postal_code"), Some("Enter a valid postal code"));
        assert!(!errors.has("city"));
    }

    #[test]
    fn test_from_cart_snapshots_total_and_status() {
        let order = order_with_status(OrderStatus::Pending);
        assert_eq!(order.total, Price::from_cents(2_000));
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_item_count_saturates_on_stored_quantities() {
        let mut order = order_with_status(OrderStatus::Pending);
        order.items[0].quantity = u32::MAX;
        order.items.push(order.items[0].clone());
        assert_eq!(order.item_count(), u32::MAX);
    }

    #[test]
    fn test_transition_follows_table() {
        let mut order = order_with_status(OrderStatus::Pending);
        order.transition(OrderStatus::Confirmed).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let err = order.transition(OrderStatus::Delivered).unwrap_err();
        assert_eq!(err.from, OrderStatus::Confirmed);
        assert_eq!(err.to, OrderStatus::Delivered);
        assert_eq!(order.status, OrderStatus::Confirmed);
    }

    #[test]
    fn test_order_wire_shape() {
        let order = order_with_status(OrderStatus::Shipped);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "shipped");
        assert_eq!(json["paymentMethod"], "card");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["shipping"]["postalCode"], "97201");
        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
