//! Checkout against a live storefront and data endpoint.
//!
//! Stock is reserved line by line; these tests check that a failure part way
//! through gives back what was already taken.

#![allow(clippy::indexing_slicing)]

use serde_json::json;
use verdora_core::{OrderStatus, PaymentMethod, Price, UserId};
use verdora_integration_tests::{TestApp, location};

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_checkout_places_order_and_decrements_stock() {
    let app = TestApp::spawn().await;
    let monstera = app.seed_product("Monstera Deliciosa", "34.50", 5);
    let pothos = app.seed_product("Golden Pothos", "12.00", 10);

    let client = TestApp::client();
    let user_id = app.register(&client, "Ivy Green", "ivy@example.com").await;
    app.add_to_cart(&client, &monstera, 2).await;
    app.add_to_cart(&client, &pothos, 1).await;

    let resp = app.checkout(&client).await;
    let target = location(&resp);
    assert!(
        target.starts_with("/checkout/confirmation/"),
        "unexpected redirect: {target}"
    );

    assert_eq!(app.data.stock(&monstera), Some(3));
    assert_eq!(app.data.stock(&pothos), Some(9));

    let orders = app.data.orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.user_id, UserId::new(user_id));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, PaymentMethod::Card);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.item_count(), 3);
    assert_eq!(order.total, Price::from_cents(8_100));
    assert_eq!(order.shipping.full_name, "Ivy Green");

    let counts = app.counts(&client).await;
    assert_eq!(counts["cart"], 0);

    let confirmation = app.get(&client, &target).await;
    assert_eq!(confirmation.status(), 200);
    let body = confirmation.text().await.expect("Failed to read body");
    assert!(body.contains("Monstera Deliciosa"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failed_reservation_releases_earlier_lines() {
    let app = TestApp::spawn().await;
    let first = app.seed_product("Snake Plant", "19.99", 5);
    let second = app.seed_product("ZZ Plant", "24.00", 5);

    let client = TestApp::client();
    app.register(&client, "Rose Thorn", "rose@example.com").await;
    app.add_to_cart(&client, &first, 2).await;
    app.add_to_cart(&client, &second, 1).await;

    app.data.fail_patches_of("products", &second);
    let resp = app.checkout(&client).await;

    assert!(resp.status().is_server_error(), "got {}", resp.status());
    assert_eq!(app.data.stock(&first), Some(5));
    assert_eq!(app.data.stock(&second), Some(5));
    assert!(app.data.all("orders").is_empty());

    // The cart survives a failed checkout.
    let counts = app.counts(&client).await;
    assert_eq!(counts["cart"], 3);
}

#[tokio::test]
async fn test_stock_sold_elsewhere_rejects_checkout() {
    let app = TestApp::spawn().await;
    let fern = app.seed_product("Boston Fern", "15.00", 2);

    let client = TestApp::client();
    app.register(&client, "Fern Gully", "fern@example.com").await;
    app.add_to_cart(&client, &fern, 2).await;

    // Another shopper bought one in the meantime.
    app.data.patch("products", &fern, &json!({ "stock": 1 }));

    let resp = app.checkout(&client).await;
    assert_eq!(location(&resp), "/cart");
    assert_eq!(app.data.stock(&fern), Some(1));
    assert!(app.data.all("orders").is_empty());
}

#[tokio::test]
async fn test_empty_cart_checkout_redirects_to_cart() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Moss Stone", "moss@example.com").await;

    let resp = app.get(&client, "/checkout").await;
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/cart");

    let resp = app
        .post_form(&client, "/checkout/payment", &[("payment_method", "card")])
        .await;
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/cart");
    assert!(app.data.all("orders").is_empty());
}

#[tokio::test]
async fn test_checkout_requires_login() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();

    let resp = app.get(&client, "/checkout").await;
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), "/auth/login");
}

#[tokio::test]
async fn test_invalid_shipping_form_is_rejected() {
    let app = TestApp::spawn().await;
    let cactus = app.seed_product("Bunny Ear Cactus", "9.50", 3);

    let client = TestApp::client();
    app.register(&client, "Saguaro", "saguaro@example.com").await;
    app.add_to_cart(&client, &cactus, 1).await;

    let resp = app
        .post_form(
            &client,
            "/checkout",
            &[
                ("full_name", ""),
                ("email", "not-an-email"),
                ("phone", "12"),
                ("address", "Desert Road 9"),
                ("city", "Tucson"),
                ("postal_code", "85701"),
                ("country", "US"),
            ],
        )
        .await;
    assert_eq!(resp.status(), 422);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Full name is required"));
    assert!(body.contains("Enter a valid email address"));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_customer_cancel_restocks_items() {
    let app = TestApp::spawn().await;
    let calathea = app.seed_product("Calathea Orbifolia", "28.00", 4);

    let client = TestApp::client();
    app.register(&client, "Cal Lathea", "cal@example.com").await;
    app.add_to_cart(&client, &calathea, 3).await;
    let resp = app.checkout(&client).await;
    let order_id = location(&resp)
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    assert_eq!(app.data.stock(&calathea), Some(1));

    let cancel = format!("/account/orders/{order_id}/cancel");
    let resp = app.post_form(&client, &cancel, &[]).await;
    assert_eq!(location(&resp), format!("/account/orders/{order_id}"));
    assert_eq!(
        app.data.order_status(&order_id),
        Some(OrderStatus::Cancelled)
    );
    assert_eq!(app.data.stock(&calathea), Some(4));

    // A second cancel is refused and does not restock twice.
    app.post_form(&client, &cancel, &[]).await;
    assert_eq!(app.data.stock(&calathea), Some(4));
}

#[tokio::test]
async fn test_customer_cannot_cancel_someone_elses_order() {
    let app = TestApp::spawn().await;
    let aloe = app.seed_product("Aloe Vera", "8.00", 5);

    let buyer = TestApp::client();
    app.register(&buyer, "Al Oe", "aloe@example.com").await;
    app.add_to_cart(&buyer, &aloe, 1).await;
    let resp = app.checkout(&buyer).await;
    let order_id = location(&resp)
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let other = TestApp::client();
    app.register(&other, "Nosy Neighbour", "nosy@example.com").await;
    let resp = app
        .post_form(&other, &format!("/account/orders/{order_id}/cancel"), &[])
        .await;

    assert_eq!(resp.status(), 404);
    assert_eq!(
        app.data.order_status(&order_id),
        Some(OrderStatus::Pending)
    );
    assert_eq!(app.data.stock(&aloe), Some(4));
}
