//! Authentication service.
//!
//! Password accounts stored on the data endpoint, with argon2 hashes and
//! emailed six-digit reset codes.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use verdora_core::{Email, NewUser, Role, User, UserId, UserPatch};

use crate::data::DataClient;
use crate::services::email::EmailClient;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// How long an emailed reset code stays valid.
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

/// Wrong codes accepted before a reset request is void.
const MAX_RESET_ATTEMPTS: u8 = 5;

/// A password reset waiting for its code, kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReset {
    pub user_id: UserId,
    pub email: Email,
    code: String,
    pub expires_at: DateTime<Utc>,
    attempts: u8,
}

impl PendingReset {
    fn new(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            code: generate_code(),
            expires_at: now + Duration::minutes(RESET_CODE_TTL_MINUTES),
            attempts: 0,
        }
    }

    /// Whether the code can no longer be redeemed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Check a submitted code, counting failures.
    ///
    /// # Errors
    ///
    /// Returns `ResetExpired`, `TooManyAttempts` or `InvalidResetCode`.
    pub fn check_code(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        if self.is_expired(now) {
            return Err(AuthError::ResetExpired);
        }
        if self.attempts >= MAX_RESET_ATTEMPTS {
            return Err(AuthError::TooManyAttempts);
        }
        if code.trim() != self.code {
            self.attempts += 1;
            return Err(AuthError::InvalidResetCode);
        }
        Ok(())
    }
}

/// Authentication service.
///
/// Handles registration, login and password resets.
pub struct AuthService<'a> {
    data: &'a DataClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(data: &'a DataClient) -> Self {
        Self { data }
    }

    /// Register a new shopper account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingName` if the name is blank.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password))]
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let email = Email::parse(email)?;
        validate_password(password)?;

        if self.data.find_user_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let user = self
            .data
            .create_user(&NewUser {
                name: name.to_owned(),
                email,
                password: hash_password(password)?,
                role: Role::User,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let user = self
            .data
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &user.password)?;

        Ok(user)
    }

    /// Start a password reset.
    ///
    /// Returns `None` for unknown addresses; callers must respond identically
    /// either way so that registered emails are not disclosed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid, or an
    /// error if the lookup or the email delivery fails.
    #[instrument(skip(self, mailer))]
    pub async fn request_password_reset(
        &self,
        email: &str,
        mailer: &EmailClient,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingReset>, AuthError> {
        let email = Email::parse(email)?;
        let Some(user) = self.data.find_user_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(None);
        };

        let pending = PendingReset::new(&user, now);
        mailer
            .send_reset_code(&user.email, &user.name, &pending.code, pending.expires_at)
            .await?;
        Ok(Some(pending))
    }

    /// Redeem a reset code and set a new password.
    ///
    /// `pending` records failed attempts; callers must store it back.
    ///
    /// # Errors
    ///
    /// Returns the code errors of [`PendingReset::check_code`],
    /// `AuthError::WeakPassword`, or `AuthError::UserNotFound` if the account
    /// disappeared in the meantime.
    #[instrument(skip(self, pending, code, new_password), fields(user_id = %pending.user_id))]
    pub async fn reset_password(
        &self,
        pending: &mut PendingReset,
        code: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        pending.check_code(code, now)?;
        validate_password(new_password)?;

        let patch = UserPatch {
            password: Some(hash_password(new_password)?),
            ..UserPatch::default()
        };
        let user = self
            .data
            .update_user(&pending.user_id, &patch)
            .await
            .map_err(|e| match e {
                crate::data::DataError::NotFound(_) => AuthError::UserNotFound,
                other => AuthError::Data(other),
            })?;

        tracing::info!(user_id = %user.id, "Password reset");
        Ok(user)
    }

    /// Change the display name.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingName` if the name is blank.
    #[instrument(skip(self))]
    pub async fn update_name(&self, user_id: &UserId, name: &str) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }
        let patch = UserPatch {
            name: Some(name.to_owned()),
            ..UserPatch::default()
        };
        Ok(self.data.update_user(user_id, &patch).await?)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: &UserId) -> Result<User, AuthError> {
        self.data
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Six random digits, zero padded.
fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..1_000_000);
    format!("{n:06}")
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
