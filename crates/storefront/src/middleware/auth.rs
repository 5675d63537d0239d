//! Authentication middleware and extractors.
//!
//! Provides extractors for the current shopper, for requiring a login and for
//! requiring the admin role in route handlers.

use axum::{
    extract::FromRequestParts,
    http::{Method, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use verdora_core::GuestId;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;
use crate::store::Owner;

/// Extractor that requires a logged-in user.
///
/// If the user is not logged in, returns a redirect to the login page and
/// remembers the requested page so login can return to it.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication or authorization fails.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (no session layer, or non-HTML endpoints).
    Unauthorized,
    /// Logged in but lacking the admin role.
    Forbidden,
    /// The role could not be verified.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => {
                (StatusCode::FORBIDDEN, "Administrator access required").into_response()
            }
            Self::Unavailable => {
                (StatusCode::BAD_GATEWAY, "External service error").into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::Unauthorized)?;

        match current_user(session).await {
            Some(user) => Ok(Self(user)),
            None => {
                if parts.method == Method::GET {
                    remember_return_to(session, parts).await;
                }
                Err(AuthRejection::RedirectToLogin)
            }
        }
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if the user is not logged in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await,
            None => None,
        };

        Ok(Self(user))
    }
}

/// Extractor that requires a logged-in administrator.
///
/// The session only holds a snapshot of the role, so the account is re-read
/// from the data endpoint on every request; a demoted or deleted admin loses
/// access immediately.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(current) = RequireAuth::from_request_parts(parts, state).await?;

        let user = state.data().get_user(&current.id).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to verify admin role");
            AuthRejection::Unavailable
        })?;

        match user {
            Some(user) if user.is_admin() => Ok(Self(CurrentUser::from(&user))),
            _ => {
                tracing::warn!(user_id = %current.id, path = %parts.uri.path(), "Admin access denied");
                Err(AuthRejection::Forbidden)
            }
        }
    }
}

/// The shopper behind a request: the session, the logged-in user if any, and
/// the owner key for their cart and wishlist.
///
/// Guests get a fresh [`GuestId`] the first time they need one.
pub struct Shopper {
    pub session: Session,
    pub user: Option<CurrentUser>,
    pub owner: Owner,
}

impl<S> FromRequestParts<S> for Shopper
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

        let user = current_user(&session).await;
        let owner = match &user {
            Some(user) => Owner::User(user.id.clone()),
            None => Owner::Guest(guest_id(&session).await?),
        };

        Ok(Self {
            session,
            user,
            owner,
        })
    }
}

async fn current_user(session: &Session) -> Option<CurrentUser> {
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// The session's guest id, minted on first use.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn guest_id(session: &Session) -> Result<GuestId, tower_sessions::session::Error> {
    if let Some(id) = session.get::<GuestId>(session_keys::GUEST_ID).await? {
        return Ok(id);
    }
    let id = GuestId::generate();
    session.insert(session_keys::GUEST_ID, id).await?;
    Ok(id)
}

async fn remember_return_to(session: &Session, parts: &Parts) {
    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    if let Err(e) = session.insert(session_keys::RETURN_TO, target).await {
        tracing::warn!(error = %e, "Failed to remember return path");
    }
}

/// Take the page to return to after login.
///
/// Only local paths are honoured.
pub async fn take_return_to(session: &Session) -> Option<String> {
    session
        .remove::<String>(session_keys::RETURN_TO)
        .await
        .ok()
        .flatten()
        .filter(|path| is_local_path(path))
}

pub(crate) fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

/// Helper to set the current user in the session.
///
/// The session id is cycled to prevent fixation. The guest id is kept so the
/// guest cart is still there after logout.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    session.remove::<serde_json::Value>(session_keys::CHECKOUT).await?;
    session.cycle_id().await?;
    Ok(())
}
