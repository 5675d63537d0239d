//! Integration tests for Verdora.
//!
//! Each test boots a real storefront on an ephemeral port, backed by an
//! in-process stand-in for the JSON data endpoint. The stand-in speaks the
//! same REST shape (`/{collection}`, `/{collection}/{id}`, equality filters
//! in the query string) and also captures outgoing reset emails.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p verdora-integration-tests
//! ```
//!
//! No database or network access is needed: sessions and carts live in
//! memory.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use reqwest::{Client, redirect::Policy};
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use url::Url;

use verdora_core::{Order, OrderStatus, Product};

use verdora_storefront::config::{EmailConfig, StorefrontConfig};
use verdora_storefront::routes;
use verdora_storefront::state::AppState;

// ============================================================================
// Data endpoint stand-in
// ============================================================================

#[derive(Default)]
struct Collections {
    rows: HashMap<String, Vec<Value>>,
    next_id: u64,
    failing_patches: HashSet<(String, String)>,
    emails: Vec<Value>,
}

impl Collections {
    fn assign_id(&mut self) -> String {
        self.next_id += 1;
        (100 + self.next_id).to_string()
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Option<&mut Value> {
        self.rows
            .get_mut(collection)?
            .iter_mut()
            .find(|row| id_of(row) == Some(id))
    }
}

fn id_of(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// Query-string equality, compared the way the data endpoint does: on the
/// textual form of the field.
fn field_matches(row: &Value, key: &str, expected: &str) -> bool {
    match row.get(key) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    }
}

/// Handle to the fake data endpoint. Cloning shares the same collections.
#[derive(Clone, Default)]
pub struct MockData {
    inner: Arc<Mutex<Collections>>,
}

impl MockData {
    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().expect("mock data lock poisoned")
    }

    /// Insert a row as-is. Rows without an id get one assigned.
    pub fn insert(&self, collection: &str, mut row: Value) -> Value {
        let mut data = self.lock();
        if id_of(&row).is_none() {
            let id = data.assign_id();
            row["id"] = Value::String(id);
        }
        data.rows
            .entry(collection.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// One row by id.
    #[must_use]
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.lock().find_mut(collection, id).cloned()
    }

    /// Every row of a collection.
    #[must_use]
    pub fn all(&self, collection: &str) -> Vec<Value> {
        self.lock().rows.get(collection).cloned().unwrap_or_default()
    }

    /// Merge fields into a row directly, bypassing the storefront.
    pub fn patch(&self, collection: &str, id: &str, fields: &Value) {
        let mut data = self.lock();
        if let (Some(row), Some(fields)) = (data.find_mut(collection, id), fields.as_object()) {
            merge(row, fields);
        }
    }

    /// Make every PATCH of one row fail with a 500.
    pub fn fail_patches_of(&self, collection: &str, id: &str) {
        self.lock()
            .failing_patches
            .insert((collection.to_string(), id.to_string()));
    }

    /// A product row read back as the storefront sees it.
    #[must_use]
    pub fn product(&self, product_id: &str) -> Option<Product> {
        self.get("products", product_id)
            .and_then(|row| serde_json::from_value(row).ok())
    }

    /// Current stock of a product.
    #[must_use]
    pub fn stock(&self, product_id: &str) -> Option<u32> {
        self.product(product_id).map(|p| p.stock)
    }

    /// Every stored order, typed. Panics on a row the storefront could not
    /// read back either.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.all("orders")
            .into_iter()
            .map(|row| serde_json::from_value(row).expect("malformed order row"))
            .collect()
    }

    /// Status of one order.
    #[must_use]
    pub fn order_status(&self, order_id: &str) -> Option<OrderStatus> {
        self.get("orders", order_id)
            .and_then(|row| serde_json::from_value::<Order>(row).ok())
            .map(|order| order.status)
    }

    /// The passcode in the most recent reset email sent to `email`.
    #[must_use]
    pub fn last_reset_code(&self, email: &str) -> Option<String> {
        self.lock()
            .emails
            .iter()
            .rev()
            .map(|body| &body["template_params"])
            .find(|params| params["to_email"] == email)
            .and_then(|params| params["passcode"].as_str())
            .map(str::to_string)
    }

    /// Number of emails captured so far.
    #[must_use]
    pub fn email_count(&self) -> usize {
        self.lock().emails.len()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/email", post(capture_email))
            .route("/{collection}", get(list_rows).post(create_row))
            .route(
                "/{collection}/{id}",
                get(get_row)
                    .put(replace_row)
                    .patch(patch_row)
                    .delete(delete_row),
            )
            .with_state(self.clone())
    }
}

fn merge(row: &mut Value, fields: &Map<String, Value>) {
    if let Some(target) = row.as_object_mut() {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
}

async fn list_rows(
    State(mock): State<MockData>,
    Path(collection): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let rows = mock
        .all(&collection)
        .into_iter()
        .filter(|row| filters.iter().all(|(k, v)| field_matches(row, k, v)))
        .collect();
    Json(rows)
}

async fn get_row(
    State(mock): State<MockData>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    mock.get(&collection, &id)
        .map_or_else(|| StatusCode::NOT_FOUND.into_response(), |row| Json(row).into_response())
}

async fn create_row(
    State(mock): State<MockData>,
    Path(collection): Path<String>,
    Json(mut row): Json<Value>,
) -> Response {
    if let Some(fields) = row.as_object_mut() {
        fields.remove("id");
    }
    (StatusCode::CREATED, Json(mock.insert(&collection, row))).into_response()
}

async fn replace_row(
    State(mock): State<MockData>,
    Path((collection, id)): Path<(String, String)>,
    Json(mut body): Json<Value>,
) -> Response {
    let mut data = mock.lock();
    let Some(row) = data.find_mut(&collection, &id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    body["id"] = Value::String(id);
    *row = body;
    Json(row.clone()).into_response()
}

async fn patch_row(
    State(mock): State<MockData>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let mut data = mock.lock();
    if data.failing_patches.contains(&(collection.clone(), id.clone())) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }
    let Some(row) = data.find_mut(&collection, &id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(fields) = body.as_object() {
        merge(row, fields);
    }
    Json(row.clone()).into_response()
}

async fn delete_row(
    State(mock): State<MockData>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let mut data = mock.lock();
    let Some(rows) = data.rows.get_mut(&collection) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let before = rows.len();
    rows.retain(|row| id_of(row) != Some(id.as_str()));
    if rows.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({})).into_response()
}

async fn capture_email(State(mock): State<MockData>, Json(body): Json<Value>) -> &'static str {
    mock.lock().emails.push(body);
    "OK"
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });
    addr
}

// ============================================================================
// Storefront under test
// ============================================================================

/// A running storefront and the data behind it.
pub struct TestApp {
    pub base_url: String,
    pub data: MockData,
}

impl TestApp {
    /// Start a fresh data endpoint and a storefront pointed at it.
    pub async fn spawn() -> Self {
        let data = MockData::default();
        let data_addr = serve(data.router()).await;
        let data_url: Url = format!("http://{data_addr}/")
            .parse()
            .expect("Invalid data URL");

        let email = EmailConfig {
            api_url: data_url.join("email").expect("Invalid email URL"),
            service_id: "service_test".to_string(),
            template_id: "template_reset".to_string(),
            public_key: "public_test".to_string(),
            access_token: SecretString::from("token_test"),
        };
        let config = StorefrontConfig {
            email: Some(email),
            auth_burst: 1_000,
            ..StorefrontConfig::local(data_url)
        };

        let state = AppState::new(config, None).expect("Failed to build app state");
        let addr = serve(routes::app(state)).await;

        Self {
            base_url: format!("http://{addr}"),
            data,
        }
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("Failed to create HTTP client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Add a product to the catalog and return its id.
    pub fn seed_product(&self, name: &str, price: &str, stock: u32) -> String {
        let row = self.data.insert(
            "products",
            json!({
                "name": name,
                "description": format!("{name}, potted and ready"),
                "price": price,
                "stock": stock,
                "category": "Indoor"
            }),
        );
        id_of(&row).unwrap_or_default().to_string()
    }

    pub async fn get(&self, client: &Client, path: &str) -> reqwest::Response {
        client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    pub async fn post_form(
        &self,
        client: &Client,
        path: &str,
        form: &[(&str, &str)],
    ) -> reqwest::Response {
        client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Register and sign in. Returns the new user's id.
    pub async fn register(&self, client: &Client, name: &str, email: &str) -> String {
        let resp = self
            .post_form(
                client,
                "/auth/register",
                &[
                    ("name", name),
                    ("email", email),
                    ("password", PASSWORD),
                    ("password_confirm", PASSWORD),
                ],
            )
            .await;
        assert!(
            resp.status().is_redirection(),
            "registration failed with {}",
            resp.status()
        );

        self.data
            .all("users")
            .iter()
            .find(|u| u["email"] == email)
            .and_then(id_of)
            .expect("registered user missing from data endpoint")
            .to_string()
    }

    /// Sign in with an existing account.
    pub async fn login(&self, client: &Client, email: &str, password: &str) -> reqwest::Response {
        self.post_form(client, "/auth/login", &[("email", email), ("password", password)])
            .await
    }

    /// Register an account, grant it the admin role, and sign in again.
    pub async fn admin_client(&self, email: &str) -> Client {
        let client = Self::client();
        let id = self.register(&client, "Ada Admin", email).await;
        self.data.patch("users", &id, &json!({ "role": "admin" }));
        self.post_form(&client, "/auth/logout", &[]).await;
        let resp = self.login(&client, email, PASSWORD).await;
        assert_eq!(location(&resp), "/admin");
        client
    }

    pub async fn add_to_cart(&self, client: &Client, product_id: &str, quantity: u32) {
        let quantity = quantity.to_string();
        let resp = self
            .post_form(
                client,
                "/cart/add",
                &[("product_id", product_id), ("quantity", &quantity)],
            )
            .await;
        assert!(resp.status().is_redirection());
    }

    /// Cart and wishlist badge counts.
    pub async fn counts(&self, client: &Client) -> Value {
        self.get(client, "/cart/count")
            .await
            .json()
            .await
            .expect("count response is not JSON")
    }

    /// Submit shipping details and pay. Returns the response to the payment
    /// step.
    pub async fn checkout(&self, client: &Client) -> reqwest::Response {
        let resp = self
            .post_form(
                client,
                "/checkout",
                &[
                    ("full_name", "Ivy Green"),
                    ("email", "ivy@example.com"),
                    ("phone", "+31 20 555 0101"),
                    ("address", "Prinsengracht 1"),
                    ("city", "Amsterdam"),
                    ("postal_code", "1015 DK"),
                    ("country", "NL"),
                ],
            )
            .await;
        assert_eq!(location(&resp), "/checkout/payment", "shipping step rejected");

        self.post_form(client, "/checkout/payment", &[("payment_method", "card")])
            .await
    }
}

/// Password used by every test account.
pub const PASSWORD: &str = "correct horse battery";

/// The `Location` header of a redirect, or an empty string.
#[must_use]
pub fn location(resp: &reqwest::Response) -> String {
    resp.headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
