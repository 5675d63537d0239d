//! Back-office access control, order workflow and catalog management.

use serde_json::json;
use verdora_core::OrderStatus;
use verdora_integration_tests::{TestApp, location};

/// Place a one-line order as a fresh customer and return its id.
async fn place_order(app: &TestApp, product_id: &str, quantity: u32) -> String {
    let client = TestApp::client();
    app.register(&client, "Petra Customer", "petra@example.com").await;
    app.add_to_cart(&client, product_id, quantity).await;
    let resp = app.checkout(&client).await;
    location(&resp)
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn order_status(app: &TestApp, order_id: &str) -> &'static str {
    app.data
        .order_status(order_id)
        .map_or("missing", OrderStatus::as_str)
}

// ============================================================================
// Access Control
// ============================================================================

#[tokio::test]
async fn test_anonymous_visitor_is_sent_to_login() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();

    for path in ["/admin", "/admin/orders", "/admin/products", "/admin/reports"] {
        let resp = app.get(&client, path).await;
        assert!(resp.status().is_redirection(), "{path}: {}", resp.status());
        assert_eq!(location(&resp), "/auth/login");
    }
}

#[tokio::test]
async fn test_customer_is_forbidden() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Just Browsing", "browse@example.com").await;

    for path in ["/admin", "/admin/users", "/admin/reports"] {
        let resp = app.get(&client, path).await;
        assert_eq!(resp.status(), 403, "{path}");
    }

    let resp = app
        .post_form(&client, "/admin/products/1/delete", &[])
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_revoked_admin_loses_access_immediately() {
    let app = TestApp::spawn().await;
    let client = app.admin_client("ada@example.com").await;
    assert_eq!(app.get(&client, "/admin").await.status(), 200);

    let id = app
        .data
        .all("users")
        .iter()
        .find(|u| u["email"] == "ada@example.com")
        .and_then(|u| u["id"].as_str())
        .unwrap_or_default()
        .to_string();
    app.data.patch("users", &id, &json!({ "role": "user" }));

    assert_eq!(app.get(&client, "/admin").await.status(), 403);
}

// ============================================================================
// Order Workflow
// ============================================================================

#[tokio::test]
async fn test_admin_moves_order_through_allowed_statuses() {
    let app = TestApp::spawn().await;
    let peace_lily = app.seed_product("Peace Lily", "18.00", 6);
    let order_id = place_order(&app, &peace_lily, 1).await;
    let admin = app.admin_client("ada@example.com").await;

    let status_path = format!("/admin/orders/{order_id}/status");
    for next in ["confirmed", "processing", "shipped", "delivered"] {
        let resp = app
            .post_form(&admin, &status_path, &[("status", next)])
            .await;
        assert_eq!(location(&resp), format!("/admin/orders/{order_id}"));
        assert_eq!(order_status(&app, &order_id), next);
    }

    // Delivered is final.
    app.post_form(&admin, &status_path, &[("status", "cancelled")])
        .await;
    assert_eq!(order_status(&app, &order_id), "delivered");
    assert_eq!(app.data.stock(&peace_lily), Some(5));
}

#[tokio::test]
async fn test_admin_cannot_skip_statuses() {
    let app = TestApp::spawn().await;
    let rubber = app.seed_product("Rubber Plant", "26.00", 3);
    let order_id = place_order(&app, &rubber, 1).await;
    let admin = app.admin_client("ada@example.com").await;

    let status_path = format!("/admin/orders/{order_id}/status");
    app.post_form(&admin, &status_path, &[("status", "shipped")])
        .await;
    assert_eq!(order_status(&app, &order_id), "pending");

    app.post_form(&admin, &status_path, &[("status", "lost-in-transit")])
        .await;
    assert_eq!(order_status(&app, &order_id), "pending");
}

#[tokio::test]
async fn test_admin_cancel_restocks() {
    let app = TestApp::spawn().await;
    let hoya = app.seed_product("Hoya Carnosa", "16.00", 5);
    let order_id = place_order(&app, &hoya, 2).await;
    assert_eq!(app.data.stock(&hoya), Some(3));

    let admin = app.admin_client("ada@example.com").await;
    let status_path = format!("/admin/orders/{order_id}/status");
    app.post_form(&admin, &status_path, &[("status", "confirmed")])
        .await;
    app.post_form(&admin, &status_path, &[("status", "processing")])
        .await;
    app.post_form(&admin, &status_path, &[("status", "cancelled")])
        .await;

    assert_eq!(order_status(&app, &order_id), "cancelled");
    assert_eq!(app.data.stock(&hoya), Some(5));
}

#[tokio::test]
async fn test_order_pages_render() {
    let app = TestApp::spawn().await;
    let pilea = app.seed_product("Pilea Peperomioides", "14.00", 5);
    let order_id = place_order(&app, &pilea, 1).await;
    let admin = app.admin_client("ada@example.com").await;

    let resp = app.get(&admin, "/admin/orders?status=pending").await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Ivy Green"));

    let resp = app.get(&admin, &format!("/admin/orders/{order_id}")).await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("Pilea Peperomioides"));

    let resp = app.get(&admin, "/admin/orders/999999").await;
    assert_eq!(resp.status(), 404);
}

// ============================================================================
// Catalog Management
// ============================================================================

#[tokio::test]
async fn test_admin_creates_and_deletes_product() {
    let app = TestApp::spawn().await;
    let admin = app.admin_client("ada@example.com").await;

    let resp = app
        .post_form(
            &admin,
            "/admin/products",
            &[
                ("name", "String of Pearls"),
                ("description", "Trailing succulent"),
                ("price", "13.50"),
                ("stock", "7"),
                ("category", "Succulents"),
                ("image", "https://images.example.com/pearls.jpg"),
                ("rating", "4.5"),
                ("sunlight", "Bright indirect"),
                ("petFriendly", "no"),
            ],
        )
        .await;
    assert!(resp.status().is_redirection(), "got {}", resp.status());

    let products = app.data.all("products");
    let created = products
        .iter()
        .find(|p| p["name"] == "String of Pearls")
        .expect("product was not created");
    assert_eq!(created["stock"], 7);
    let id = created["id"].as_str().unwrap_or_default().to_string();

    let resp = app.get(&admin, &format!("/products/{id}")).await;
    assert_eq!(resp.status(), 200);

    app.post_form(&admin, &format!("/admin/products/{id}/delete"), &[])
        .await;
    assert!(app.data.get("products", &id).is_none());
}

#[tokio::test]
async fn test_invalid_product_form_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.admin_client("ada@example.com").await;

    let resp = app
        .post_form(
            &admin,
            "/admin/products",
            &[
                ("name", ""),
                ("description", ""),
                ("price", "free"),
                ("stock", "-3"),
                ("category", "Indoor"),
                ("image", ""),
                ("rating", "9"),
            ],
        )
        .await;
    assert_eq!(resp.status(), 422);
    assert!(app.data.all("products").is_empty());
}

// ============================================================================
// Users & Reports
// ============================================================================

#[tokio::test]
async fn test_admin_cannot_demote_self() {
    let app = TestApp::spawn().await;
    let admin = app.admin_client("ada@example.com").await;
    let id = app
        .data
        .all("users")
        .iter()
        .find(|u| u["email"] == "ada@example.com")
        .and_then(|u| u["id"].as_str())
        .unwrap_or_default()
        .to_string();

    let resp = app
        .post_form(&admin, &format!("/admin/users/{id}/role"), &[("role", "user")])
        .await;
    assert_eq!(location(&resp), "/admin/users");
    assert_eq!(
        app.data.get("users", &id).map(|u| u["role"].clone()),
        Some(json!("admin"))
    );
}

#[tokio::test]
async fn test_reports_show_revenue_and_low_stock() {
    let app = TestApp::spawn().await;
    let tillandsia = app.seed_product("Tillandsia", "10.00", 3);
    app.seed_product("Bird of Paradise", "80.00", 40);
    place_order(&app, &tillandsia, 2).await;
    let admin = app.admin_client("ada@example.com").await;

    let resp = app.get(&admin, "/admin/reports").await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.expect("Failed to read body");
    assert!(body.contains("$20.00"));
    assert!(body.contains("Tillandsia"));

    let resp = app.get(&admin, "/admin").await;
    assert_eq!(resp.status(), 200);
}
