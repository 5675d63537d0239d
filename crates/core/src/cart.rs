//! Cart and wishlist collections.
//!
//! Both are plain lists owned by one shopper and persisted as JSON by the
//! storefront's client store.

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::types::{Price, ProductId};

/// A product plus the quantity in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.unit_price() * self.quantity
    }
}

/// A shopper's cart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Consume the cart, returning its line items.
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    /// Add a product. A product already in the cart has its quantity
    /// incremented instead of getting a second line; a zero quantity counts
    /// as one.
    pub fn add(&mut self, product: Product, quantity: u32) {
        let quantity = quantity.max(1);
        if let Some(line) = self.items.iter_mut().find(|i| i.product.id == product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            self.items.push(CartItem { product, quantity });
        }
    }

    /// Set the quantity of a line; zero removes it. Returns whether the line
    /// existed.
    pub fn set_quantity(&mut self, id: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(id);
        }
        match self.items.iter_mut().find(|i| &i.product.id == id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Remove the line with exactly this product id. Returns whether a line
    /// was removed.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.product.id != id);
        self.items.len() != before
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0, |total: u32, i| total.saturating_add(i.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Quantity of a given product, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, id: &ProductId) -> u32 {
        self.items
            .iter()
            .find(|i| &i.product.id == id)
            .map_or(0, |i| i.quantity)
    }
}

/// A saved-for-later entry.
///
/// A snapshot taken when the shopper saved it; it is not kept in sync with
/// later catalog edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: ProductId,
    pub title: String,
    pub price: String,
    #[serde(default)]
    pub image: String,
}

impl From<&Product> for WishlistItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.name.clone(),
            price: product.price.clone(),
            image: product.image.clone(),
        }
    }
}

/// A shopper's wishlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    /// Saved entries in insertion order.
    #[must_use]
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    /// Save an entry. Returns `false` if it was already saved.
    pub fn add(&mut self, item: WishlistItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove an entry by id. Returns whether it was present.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|i| &i.id != id);
        self.items.len() != before
    }

    /// Whether the entry is saved.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.iter().any(|i| &i.id == id)
    }

    /// Number of saved entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::catalog::tests::product;

    #[test]
    fn test_adding_same_product_merges_quantity() {
        let mut cart = Cart::new();
        cart.add(product("7", "Pothos", "12"), 1);
        cart.add(product("7", "Pothos", "12"), 2);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn test_zero_quantity_add_counts_as_one() {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "5"), 0);
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_remove_only_touches_that_id() {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "5"), 2);
        cart.add(product("2", "Ivy", "6"), 4);
        cart.add(product("3", "Palm", "7"), 1);

        assert!(cart.remove(&ProductId::new("2")));
        assert!(!cart.remove(&ProductId::new("2")));
        assert_eq!(cart.quantity_of(&ProductId::new("1")), 2);
        assert_eq!(cart.quantity_of(&ProductId::new("3")), 1);
        assert_eq!(cart.quantity_of(&ProductId::new("2")), 0);
    }

    #[test]
    fn test_set_quantity_and_clear() {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "5"), 2);
        assert!(cart.set_quantity(&ProductId::new("1"), 5));
        assert_eq!(cart.item_count(), 5);
        assert!(!cart.set_quantity(&ProductId::new("9"), 5));
        assert!(cart.set_quantity(&ProductId::new("1"), 0));
        assert!(cart.is_empty());

        cart.add(product("2", "Ivy", "6"), 1);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_item_count_saturates_on_huge_quantities() {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "5"), 1);
        cart.add(product("2", "Ivy", "6"), 1);
        cart.set_quantity(&ProductId::new("1"), u32::MAX);
        cart.set_quantity(&ProductId::new("2"), u32::MAX);
        assert_eq!(cart.item_count(), u32::MAX);
    }

    #[test]
    fn test_subtotal_uses_parsed_prices() {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "$5.50"), 2);
        cart.add(product("2", "Ivy", "$1,000"), 1);
        assert_eq!(cart.subtotal(), Price::from_cents(101_100));
    }

    #[test]
    fn test_cart_persists_as_plain_list() {
        let mut cart = Cart::new();
        cart.add(product("1", "Fern", "5"), 2);
        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["quantity"], 2);
        assert_eq!(json[0]["name"], "Fern");

        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_wishlist_has_no_duplicates() {
        let fern = product("1", "Fern", "5");
        let mut wishlist = Wishlist::default();
        assert!(wishlist.add(WishlistItem::from(&fern)));
        assert!(!wishlist.add(WishlistItem::from(&fern)));
        assert_eq!(wishlist.len(), 1);
        assert_eq!(wishlist.items()[0].title, "Fern");
        assert!(wishlist.remove(&ProductId::new("1")));
        assert!(wishlist.is_empty());
    }
}
