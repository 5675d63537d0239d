//! Sign-in, per-user carts and password reset.

use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use verdora_integration_tests::{PASSWORD, TestApp, location};

// ============================================================================
// Cart Ownership
// ============================================================================

#[tokio::test]
async fn test_guest_cart_is_kept_apart_from_user_cart() {
    let app = TestApp::spawn().await;
    let ivy = app.seed_product("English Ivy", "11.00", 10);
    let palm = app.seed_product("Parlour Palm", "22.00", 10);

    let client = TestApp::client();
    app.add_to_cart(&client, &ivy, 2).await;
    assert_eq!(app.counts(&client).await["cart"], 2);

    // Signing in switches to the (empty) user cart; nothing is merged.
    app.register(&client, "Holly Berry", "holly@example.com").await;
    assert_eq!(app.counts(&client).await["cart"], 0);
    app.add_to_cart(&client, &palm, 1).await;
    assert_eq!(app.counts(&client).await["cart"], 1);

    // Signing out brings the guest cart back untouched.
    app.post_form(&client, "/auth/logout", &[]).await;
    assert_eq!(app.counts(&client).await["cart"], 2);

    app.login(&client, "holly@example.com", PASSWORD).await;
    assert_eq!(app.counts(&client).await["cart"], 1);
}

#[tokio::test]
async fn test_users_never_see_each_others_carts() {
    let app = TestApp::spawn().await;
    let orchid = app.seed_product("Moth Orchid", "27.00", 10);

    let first = TestApp::client();
    app.register(&first, "Orchid Lover", "orchid@example.com").await;
    app.add_to_cart(&first, &orchid, 3).await;

    let second = TestApp::client();
    app.register(&second, "Cactus Fan", "cactus@example.com").await;
    assert_eq!(app.counts(&second).await["cart"], 0);
    assert_eq!(app.counts(&first).await["cart"], 3);
}

#[tokio::test]
async fn test_cart_quantity_is_capped_at_stock() {
    let app = TestApp::spawn().await;
    let bonsai = app.seed_product("Juniper Bonsai", "65.00", 2);

    let client = TestApp::client();
    app.add_to_cart(&client, &bonsai, 5).await;
    assert_eq!(app.counts(&client).await["cart"], 2);

    app.add_to_cart(&client, &bonsai, 1).await;
    assert_eq!(app.counts(&client).await["cart"], 2);
}

#[tokio::test]
async fn test_cart_update_caps_huge_quantities_at_stock() {
    let app = TestApp::spawn().await;
    let jade = app.seed_product("Jade Plant", "12.00", 5);
    let yucca = app.seed_product("Yucca Cane", "30.00", 5);

    let client = TestApp::client();
    app.add_to_cart(&client, &jade, 1).await;
    app.add_to_cart(&client, &yucca, 1).await;

    let huge = u32::MAX.to_string();
    for id in [&jade, &yucca] {
        let resp = app
            .post_form(
                &client,
                "/cart/update",
                &[("product_id", id.as_str()), ("quantity", huge.as_str())],
            )
            .await;
        assert!(resp.status().is_redirection(), "got {}", resp.status());
        assert_eq!(location(&resp), "/cart");
    }

    assert_eq!(app.counts(&client).await["cart"], 10);
    let resp = app.get(&client, "/cart").await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_cart_events_only_carry_own_changes() {
    let app = TestApp::spawn().await;
    let pothos = app.seed_product("Marble Pothos", "14.00", 10);

    let watcher = TestApp::client();
    app.add_to_cart(&watcher, &pothos, 1).await;
    let mut stream = app.get(&watcher, "/cart/events").await;
    assert_eq!(stream.status(), 200);
    assert!(
        stream
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"))
    );

    // Someone else's cart changes first; that event must not reach us.
    let stranger = TestApp::client();
    app.add_to_cart(&stranger, &pothos, 1).await;
    app.add_to_cart(&watcher, &pothos, 2).await;

    let event = next_event(&mut stream, "cart").await;
    assert_eq!(event["kind"], "cart");
    assert_eq!(event["count"], 3);
}

/// Read the stream until an event named `name` arrives and return its data.
async fn next_event(stream: &mut reqwest::Response, name: &str) -> Value {
    let header = format!("event: {name}");
    let mut buffer = String::new();
    let deadline = Duration::from_secs(5);
    loop {
        let chunk = timeout(deadline, stream.chunk())
            .await
            .expect("no event before the deadline")
            .expect("event stream failed")
            .expect("event stream closed");
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // Events are separated by a blank line; keep-alives are comments.
        while let Some(end) = buffer.find("\n\n") {
            let block: String = buffer.drain(..end + 2).collect();
            if !block.lines().any(|line| line == header) {
                continue;
            }
            let data = block
                .lines()
                .find_map(|line| line.strip_prefix("data:"))
                .expect("event without data");
            return serde_json::from_str(data.trim()).expect("event data is not JSON");
        }
    }
}

#[tokio::test]
async fn test_wishlist_count_tracks_adds_and_removes() {
    let app = TestApp::spawn().await;
    let fig = app.seed_product("Fiddle Leaf Fig", "45.00", 3);

    let client = TestApp::client();
    app.post_form(&client, "/wishlist/add", &[("product_id", fig.as_str())])
        .await;
    app.post_form(&client, "/wishlist/add", &[("product_id", fig.as_str())])
        .await;
    assert_eq!(app.counts(&client).await["wishlist"], 1);

    app.post_form(&client, "/wishlist/remove", &[("product_id", fig.as_str())])
        .await;
    assert_eq!(app.counts(&client).await["wishlist"], 0);
}

// ============================================================================
// Registration & Login
// ============================================================================

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Basil Leaf", "basil@example.com").await;
    app.post_form(&client, "/auth/logout", &[]).await;

    let resp = app
        .post_form(
            &client,
            "/auth/register",
            &[
                ("name", "Basil Again"),
                ("email", "BASIL@example.com"),
                ("password", PASSWORD),
                ("password_confirm", PASSWORD),
            ],
        )
        .await;

    assert!(resp.status().is_client_error(), "got {}", resp.status());
    assert_eq!(app.data.all("users").len(), 1);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Sage Brush", "sage@example.com").await;
    app.post_form(&client, "/auth/logout", &[]).await;

    let resp = app.login(&client, "sage@example.com", "not the password").await;
    assert_eq!(resp.status(), 401);

    let resp = app.login(&client, "sage@example.com", PASSWORD).await;
    assert_eq!(location(&resp), "/account");
}

#[tokio::test]
async fn test_stored_password_is_hashed() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Thyme Keeper", "thyme@example.com").await;

    let users = app.data.all("users");
    let stored = users
        .first()
        .and_then(|u| u["password"].as_str())
        .unwrap_or_default();
    assert!(stored.starts_with("$argon2"));
    assert_ne!(stored, PASSWORD);
}

// ============================================================================
// Password Reset
// ============================================================================

#[tokio::test]
async fn test_password_reset_with_emailed_code() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Rosemary", "rosemary@example.com").await;
    app.post_form(&client, "/auth/logout", &[]).await;

    let resp = app
        .post_form(
            &client,
            "/auth/forgot-password",
            &[("email", "rosemary@example.com")],
        )
        .await;
    assert_eq!(location(&resp), "/auth/reset-password");

    let code = app
        .data
        .last_reset_code("rosemary@example.com")
        .expect("no reset email captured");
    assert_eq!(code.len(), 6);

    let new_password = "a brand new secret";
    let resp = app
        .post_form(
            &client,
            "/auth/reset-password",
            &[
                ("code", code.as_str()),
                ("password", new_password),
                ("password_confirm", new_password),
            ],
        )
        .await;
    assert_eq!(location(&resp), "/auth/login");

    let resp = app.login(&client, "rosemary@example.com", PASSWORD).await;
    assert_eq!(resp.status(), 401);

    let resp = app.login(&client, "rosemary@example.com", new_password).await;
    assert_eq!(location(&resp), "/account");
}

#[tokio::test]
async fn test_wrong_reset_code_keeps_old_password() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();
    app.register(&client, "Mint Julep", "mint@example.com").await;
    app.post_form(&client, "/auth/logout", &[]).await;

    app.post_form(&client, "/auth/forgot-password", &[("email", "mint@example.com")])
        .await;
    let code = app
        .data
        .last_reset_code("mint@example.com")
        .expect("no reset email captured");
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let resp = app
        .post_form(
            &client,
            "/auth/reset-password",
            &[
                ("code", wrong),
                ("password", "another new secret"),
                ("password_confirm", "another new secret"),
            ],
        )
        .await;
    assert!(resp.status().is_client_error(), "got {}", resp.status());

    let resp = app.login(&client, "mint@example.com", PASSWORD).await;
    assert_eq!(location(&resp), "/account");
}

#[tokio::test]
async fn test_unknown_email_gets_same_answer_and_no_mail() {
    let app = TestApp::spawn().await;
    let client = TestApp::client();

    let resp = app
        .post_form(
            &client,
            "/auth/forgot-password",
            &[("email", "nobody@example.com")],
        )
        .await;

    assert_eq!(location(&resp), "/auth/reset-password");
    assert_eq!(app.data.email_count(), 0);
}
