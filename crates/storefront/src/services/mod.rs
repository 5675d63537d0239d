//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login and password resets
//! - `email` - Transactional email API client
//! - `inventory` - Stock reservations and restocking
//! - `checkout` - Order placement with stock compensation
//! - `orders` - Order status changes

pub mod auth;
pub mod checkout;
pub mod email;
pub mod inventory;
pub mod orders;

pub use auth::{AuthError, AuthService, PendingReset};
pub use checkout::{CheckoutError, CheckoutService};
pub use email::{EmailClient, MailError};
pub use inventory::{Inventory, Reservation};
pub use orders::{OrderError, OrderService};
