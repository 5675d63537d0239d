//! Verdora storefront library.
//!
//! The public plant shop and its back-office, served from one binary. The
//! catalog, orders and users live behind a JSON data endpoint; carts,
//! wishlists and sessions live in `PostgreSQL` (or in memory for local runs).
//!
//! Everything is exposed as a library so the integration tests can build the
//! full [`routes::app`] against a mock data endpoint.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
