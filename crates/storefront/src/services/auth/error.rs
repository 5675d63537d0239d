//! Authentication error types.

use thiserror::Error;

use crate::data::DataError;
use crate::services::email::MailError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] verdora_core::EmailError),

    /// Display name missing.
    #[error("name is required")]
    MissingName,

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Reset code does not match.
    #[error("invalid reset code")]
    InvalidResetCode,

    /// Reset code is past its expiry.
    #[error("reset code expired")]
    ResetExpired,

    /// Too many wrong codes for one reset request.
    #[error("too many attempts")]
    TooManyAttempts,

    /// Data endpoint error.
    #[error("data endpoint error: {0}")]
    Data(#[from] DataError),

    /// Email delivery failed.
    #[error("email error: {0}")]
    Mail(#[from] MailError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
