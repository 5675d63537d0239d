//! REST data endpoint client.
//!
//! # Architecture
//!
//! - The data endpoint is the source of truth for products, orders and users
//! - Plain JSON over HTTP: `GET`/`POST` on collections, `GET`/`PUT`/`PATCH`/`DELETE`
//!   on items, equality filters as query parameters (`/orders?userId=7`)
//! - The product list is cached in memory via `moka` (60 second TTL) and
//!   invalidated on every product write
//!
//! # Example
//!
//! ```rust,ignore
//! use verdora_storefront::data::DataClient;
//!
//! let client = DataClient::new(&config.data_url)?;
//! let products = client.list_products().await?;
//! let orders = client.list_orders_for(&user.id).await?;
//! ```

mod client;

pub use client::DataClient;

use thiserror::Error;

/// Errors that can occur when talking to the data endpoint.
#[derive(Debug, Error)]
pub enum DataError {
    /// HTTP request failed (connection refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("{method} {path} returned {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },

    /// The response body was not the expected JSON shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The record addressed by a write does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The configured base URL cannot address collections.
    #[error("Invalid data endpoint URL: {0}")]
    InvalidUrl(String),
}
