//! Session-side models for the storefront.

pub mod session;

pub use session::{CheckoutDraft, CurrentUser, Flash, FlashKind, keys as session_keys};
