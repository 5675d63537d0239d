//! `DataClient` implementation.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use verdora_core::{
    Email, NewOrder, NewProduct, NewUser, Order, OrderId, OrderStatus, Product, ProductId, User,
    UserId, UserPatch,
};

use super::DataError;

const PRODUCTS_KEY: &str = "products";
const PRODUCTS_TTL: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// DataClient
// =============================================================================

/// Client for the REST data endpoint.
///
/// Cheap to clone; all clones share the HTTP connection pool and the product
/// list cache.
#[derive(Clone)]
pub struct DataClient {
    inner: Arc<DataClientInner>,
}

struct DataClientInner {
    client: reqwest::Client,
    base: Url,
    products: Cache<&'static str, Arc<Vec<Product>>>,
}

impl DataClient {
    /// Create a client for the endpoint rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `DataError::InvalidUrl` if the URL cannot have path segments
    /// appended, or `DataError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &Url) -> Result<Self, DataError> {
        if base_url.cannot_be_a_base() {
            return Err(DataError::InvalidUrl(base_url.to_string()));
        }

        // `Url::join` replaces the last segment unless the path ends in '/'
        let mut base = base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let products = Cache::builder()
            .max_capacity(1)
            .time_to_live(PRODUCTS_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(DataClientInner {
                client,
                base,
                products,
            }),
        })
    }

    /// Base URL of the endpoint (always ends in `/`).
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base
    }

    /// Check that the endpoint answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the products collection cannot be fetched.
    pub async fn ping(&self) -> Result<(), DataError> {
        let url = self.url(&["products"])?;
        let response = self.inner.client.get(url).send().await?;
        check_status(&response, "GET", "products")?;
        Ok(())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// The full catalog. Served from cache for up to 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, DataError> {
        if let Some(products) = self.inner.products.get(PRODUCTS_KEY).await {
            debug!("Cache hit for product list");
            return Ok(products);
        }

        let products: Arc<Vec<Product>> = Arc::new(self.get_json(&["products"], &[]).await?);
        self.inner
            .products
            .insert(PRODUCTS_KEY, Arc::clone(&products))
            .await;
        Ok(products)
    }

    /// A single product, always fetched fresh (stock checks rely on it).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, DataError> {
        self.get_optional(&["products", id.as_str()]).await
    }

    /// Create a product; the endpoint assigns the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, DataError> {
        let created = self
            .send_json(Method::POST, &["products"], product)
            .await?;
        self.invalidate_products().await;
        Ok(created)
    }

    /// Replace a product record.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the product does not exist.
    #[instrument(skip(self, product), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        product: &NewProduct,
    ) -> Result<Product, DataError> {
        let updated = self
            .send_json(Method::PUT, &["products", id.as_str()], product)
            .await?;
        self.invalidate_products().await;
        Ok(updated)
    }

    /// Overwrite the stock level of a product.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<Product, DataError> {
        let updated = self
            .send_json(
                Method::PATCH,
                &["products", id.as_str()],
                &serde_json::json!({ "stock": stock }),
            )
            .await?;
        self.invalidate_products().await;
        Ok(updated)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), DataError> {
        self.delete(&["products", id.as_str()]).await?;
        self.invalidate_products().await;
        Ok(())
    }

    /// Drop the cached product list.
    pub async fn invalidate_products(&self) {
        self.inner.products.invalidate_all();
        self.inner.products.run_pending_tasks().await;
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Every order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<Order>, DataError> {
        self.get_json(&["orders"], &[]).await
    }

    /// Orders placed by one user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_orders_for(&self, user_id: &UserId) -> Result<Vec<Order>, DataError> {
        self.get_json(&["orders"], &[("userId", user_id.as_str())])
            .await
    }

    /// A single order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, DataError> {
        self.get_optional(&["orders", id.as_str()]).await
    }

    /// Create an order; the endpoint assigns the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self, order), fields(user_id = %order.user_id))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, DataError> {
        self.send_json(Method::POST, &["orders"], order).await
    }

    /// Overwrite an order's status. Transition rules are enforced by the caller.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the order does not exist.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn set_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, DataError> {
        self.send_json(
            Method::PATCH,
            &["orders", id.as_str()],
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    /// Delete an order.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the order does not exist.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn delete_order(&self, id: &OrderId) -> Result<(), DataError> {
        self.delete(&["orders", id.as_str()]).await
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Every user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<User>, DataError> {
        self.get_json(&["users"], &[]).await
    }

    /// Look a user up by (normalized) email.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self, email))]
    pub async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, DataError> {
        let users: Vec<User> = self
            .get_json(&["users"], &[("email", email.as_str())])
            .await?;
        Ok(with_email(users, email))
    }

    /// A single user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>, DataError> {
        self.get_optional(&["users", id.as_str()]).await
    }

    /// Create a user; the endpoint assigns the id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self, user))]
    pub async fn create_user(&self, user: &NewUser) -> Result<User, DataError> {
        self.send_json(Method::POST, &["users"], user).await
    }

    /// Apply a partial update to a user.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the user does not exist.
    #[instrument(skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(&self, id: &UserId, patch: &UserPatch) -> Result<User, DataError> {
        self.send_json(Method::PATCH, &["users", id.as_str()], patch)
            .await
    }

    /// Delete a user.
    ///
    /// # Errors
    ///
    /// Returns `DataError::NotFound` if the user does not exist.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete_user(&self, id: &UserId) -> Result<(), DataError> {
        self.delete(&["users", id.as_str()]).await
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Build an endpoint URL from path segments and query pairs.
    fn url(&self, segments: &[&str]) -> Result<Url, DataError> {
        let mut url = self.inner.base.clone();
        url.path_segments_mut()
            .map_err(|()| DataError::InvalidUrl(self.inner.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, DataError> {
        let mut url = self.url(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let response = self.inner.client.get(url).send().await?;
        check_status(&response, "GET", &segments.join("/"))?;
        parse_body(response).await
    }

    async fn get_optional<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<Option<T>, DataError> {
        let url = self.url(segments)?;
        let response = self.inner.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        check_status(&response, "GET", &segments.join("/"))?;
        parse_body(response).await.map(Some)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T, DataError> {
        let url = self.url(segments)?;
        let method_name = method_name(&method);
        let response = self
            .inner
            .client
            .request(method, url)
            .json(body)
            .send()
            .await?;
        check_status(&response, method_name, &segments.join("/"))?;
        parse_body(response).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<(), DataError> {
        let url = self.url(segments)?;
        let response = self.inner.client.delete(url).send().await?;
        check_status(&response, "DELETE", &segments.join("/"))?;
        Ok(())
    }
}

fn method_name(method: &Method) -> &'static str {
    match *method {
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::PATCH => "PATCH",
        Method::DELETE => "DELETE",
        _ => "GET",
    }
}

fn check_status(
    response: &reqwest::Response,
    method: &'static str,
    path: &str,
) -> Result<(), DataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    tracing::warn!(%status, method, path, "Data endpoint returned non-success status");
    if status == StatusCode::NOT_FOUND {
        return Err(DataError::NotFound(path.to_string()));
    }
    Err(DataError::Status {
        method,
        path: path.to_string(),
        status: status.as_u16(),
    })
}

async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, DataError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %text.chars().take(500).collect::<String>(),
            "Failed to parse data endpoint response"
        );
        DataError::Parse(e)
    })
}

/// The user registered under `email`, if any.
///
/// An endpoint that does not support a query filter ignores it and answers
/// with the whole collection, so the match is checked here too.
fn with_email(users: Vec<User>, email: &Email) -> Option<User> {
    users.into_iter().find(|u| &u.email == email)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> DataClient {
        DataClient::new(&Url::parse(base).unwrap()).unwrap()
    }

    #[test]
    fn test_email_lookup_ignores_unfiltered_rows() {
        let users: Vec<User> = serde_json::from_value(serde_json::json!([
            { "id": 1, "name": "Ada", "email": "ada@example.com", "password": "x" },
            { "id": 2, "name": "Bo", "email": "Bo@Example.com", "password": "x" }
        ]))
        .unwrap();

        let bo = Email::parse("bo@example.com").unwrap();
        assert_eq!(with_email(users.clone(), &bo).map(|u| u.name), Some("Bo".to_string()));

        let nobody = Email::parse("nobody@example.com").unwrap();
        assert!(with_email(users, &nobody).is_none());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        assert_eq!(
            client("http://localhost:3001").base_url().as_str(),
            "http://localhost:3001/"
        );
        assert_eq!(
            client("http://localhost:3001/api").base_url().as_str(),
            "http://localhost:3001/api/"
        );
    }

    #[test]
    fn test_url_appends_segments() {
        let c = client("http://localhost:3001/api");
        assert_eq!(
            c.url(&["products", "7"]).unwrap().as_str(),
            "http://localhost:3001/api/products/7"
        );
    }

    #[test]
    fn test_url_escapes_ids() {
        let c = client("http://localhost:3001");
        assert_eq!(
            c.url(&["orders", "a/b c"]).unwrap().as_str(),
            "http://localhost:3001/orders/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        let url = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            DataClient::new(&url),
            Err(DataError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_method_names() {
        assert_eq!(method_name(&Method::PATCH), "PATCH");
        assert_eq!(method_name(&Method::GET), "GET");
    }
}
