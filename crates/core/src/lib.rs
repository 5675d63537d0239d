//! Verdora Core - Shared domain library.
//!
//! This crate provides the domain model used across all Verdora components:
//! - `storefront` - Public storefront and `/admin` back-office
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Everything here can be unit tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, prices and statuses
//! - [`catalog`] - Product records and the filter/sort/search pipeline
//! - [`cart`] - Cart and wishlist collections
//! - [`order`] - Orders, shipping info and status transitions
//! - [`user`] - User accounts
//! - [`report`] - Aggregations for the admin reports page
//! - [`validation`] - Per-field form errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod order;
pub mod report;
pub mod types;
pub mod user;
pub mod validation;

pub use cart::{Cart, CartItem, Wishlist, WishlistItem};
pub use catalog::{CareProfile, CatalogFilter, CatalogQuery, NewProduct, Product};
pub use order::{NewOrder, Order, ShippingForm, ShippingInfo, TransitionError};
pub use types::*;
pub use user::{NewUser, User, UserPatch};
pub use validation::FieldErrors;
