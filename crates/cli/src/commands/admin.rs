//! Back-office account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account
//! verdora admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Promote an existing shopper
//! verdora admin promote -e fern@example.com
//! ```
//!
//! Accounts live on the data endpoint, so these commands talk to it rather
//! than to the database.

use thiserror::Error;
use url::Url;

use verdora_core::{Email, NewUser, Role, UserId, UserPatch};
use verdora_storefront::data::{DataClient, DataError};
use verdora_storefront::services::AuthError;
use verdora_storefront::services::auth::{hash_password, validate_password};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// Password rejected or could not be hashed.
    #[error(transparent)]
    Password(#[from] AuthError),

    /// User already exists.
    #[error("A user already exists with email: {0}")]
    UserExists(String),

    /// No user with that email.
    #[error("No user found with email: {0}")]
    UserNotFound(String),

    /// Data endpoint error.
    #[error("Data endpoint error: {0}")]
    Data(#[from] DataError),
}

/// Create a new admin user.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns an error if the email is taken, the password is too weak, or the
/// data endpoint fails.
pub async fn create_user(
    data_url: &Url,
    email: &str,
    name: &str,
    password: &str,
) -> Result<UserId, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    validate_password(password)?;

    let data = DataClient::new(data_url)?;
    if data.find_user_by_email(&email).await?.is_some() {
        return Err(AdminError::UserExists(email.to_string()));
    }

    tracing::info!("Creating admin user: {}", email);
    let user = data
        .create_user(&NewUser {
            name: name.trim().to_owned(),
            email,
            password: hash_password(password)?,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Give an existing user the admin role.
///
/// # Errors
///
/// Returns `AdminError::UserNotFound` if no account uses `email`.
pub async fn promote(data_url: &Url, email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let data = DataClient::new(data_url)?;
    let user = data
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    if user.is_admin() {
        tracing::info!("{} is already an admin", user.email);
        return Ok(());
    }

    let patch = UserPatch {
        role: Some(Role::Admin),
        ..UserPatch::default()
    };
    data.update_user(&user.id, &patch).await?;

    tracing::info!("{} ({}) is now an admin", user.name, user.email);
    Ok(())
}
