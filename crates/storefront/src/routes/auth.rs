//! Authentication route handlers.
//!
//! Handles login, registration, logout and password reset with emailed
//! six-digit codes. Failed form posts re-render the form with the error and
//! the status of the underlying [`AppError`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use verdora_core::User;

use crate::error::{AppError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{Shopper, clear_current_user, set_current_user, take_return_to};
use crate::models::{CurrentUser, Flash, session_keys};
use crate::routes::{Chrome, redirect_with};
use crate::services::{AuthError, AuthService, PendingReset};
use crate::services::auth::RESET_CODE_TTL_MINUTES;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Forgot password form data.
#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Deserialize)]
pub struct ResetPasswordForm {
    pub code: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
    pub email: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
    pub email: String,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
    pub ttl_minutes: i64,
}

// =============================================================================
// Helpers
// =============================================================================

/// Put `user` in the session and pick the landing page.
async fn sign_in(shopper: &Shopper, user: &User) -> Result<String, AppError> {
    let return_to = take_return_to(&shopper.session).await;
    let current = CurrentUser::from(user);
    set_current_user(&shopper.session, &current).await?;

    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Signed in", Some(&[("user_id", user.id.as_str())][..]));

    Ok(return_to.unwrap_or_else(|| {
        if current.is_admin() {
            "/admin".to_string()
        } else {
            "/account".to_string()
        }
    }))
}

/// Status and message for a rejected auth form; server errors propagate.
fn form_error(err: AuthError) -> Result<(StatusCode, String), AppError> {
    let err = AppError::from(err);
    let status = err.status();
    if status.is_server_error() {
        return Err(err);
    }
    Ok((status, err.public_message()))
}

async fn pending_reset(shopper: &Shopper) -> Option<PendingReset> {
    shopper
        .session
        .get::<PendingReset>(session_keys::PASSWORD_RESET)
        .await
        .ok()
        .flatten()
}

async fn reset_rejected(
    state: &AppState,
    shopper: &Shopper,
    status: StatusCode,
    message: String,
) -> Result<Response, AppError> {
    let page = ResetPasswordTemplate {
        chrome: Chrome::load(state, shopper, "/auth/login").await?,
        error: Some(message),
        ttl_minutes: RESET_CODE_TTL_MINUTES,
    };
    Ok((status, page).into_response())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<Response, AppError> {
    if shopper.user.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }

    Ok(LoginTemplate {
        chrome: Chrome::load(&state, &shopper, "/auth/login").await?,
        error: None,
        email: String::new(),
    }
    .into_response())
}

/// Handle login form submission.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    match AuthService::new(state.data())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            let landing = sign_in(&shopper, &user).await?;
            Flash::success(format!("Welcome back, {}", user.name))
                .push(&shopper.session)
                .await;
            Ok(Redirect::to(&landing).into_response())
        }
        Err(e) => {
            let (status, message) = form_error(e)?;
            tracing::info!(%status, "Login rejected");
            let page = LoginTemplate {
                chrome: Chrome::load(&state, &shopper, "/auth/login").await?,
                error: Some(message),
                email: form.email,
            };
            Ok((status, page).into_response())
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<Response, AppError> {
    if shopper.user.is_some() {
        return Ok(Redirect::to("/account").into_response());
    }

    Ok(RegisterTemplate {
        chrome: Chrome::load(&state, &shopper, "/auth/register").await?,
        error: None,
        name: String::new(),
        email: String::new(),
    }
    .into_response())
}

/// Handle registration form submission and sign the new user in.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let result = if form.password == form.password_confirm {
        match AuthService::new(state.data())
            .register(&form.name, &form.email, &form.password)
            .await
        {
            Ok(user) => Ok(user),
            Err(e) => Err(form_error(e)?),
        }
    } else {
        Err((StatusCode::BAD_REQUEST, "Passwords do not match".to_string()))
    };

    match result {
        Ok(user) => {
            let landing = sign_in(&shopper, &user).await?;
            Flash::success(format!("Welcome to Verdora, {}!", user.name))
                .push(&shopper.session)
                .await;
            Ok(Redirect::to(&landing).into_response())
        }
        Err((status, message)) => {
            let page = RegisterTemplate {
                chrome: Chrome::load(&state, &shopper, "/auth/register").await?,
                error: Some(message),
                name: form.name,
                email: form.email,
            };
            Ok((status, page).into_response())
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out. The shopper falls back to their guest cart.
pub async fn logout(shopper: Shopper) -> Result<Redirect, AppError> {
    clear_current_user(&shopper.session).await?;
    clear_sentry_user();
    Ok(redirect_with(&shopper.session, Flash::info("You have been signed out"), "/").await)
}

// =============================================================================
// Password Reset
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    Ok(ForgotPasswordTemplate {
        chrome: Chrome::load(&state, &shopper, "/auth/login").await?,
        error: None,
        email: String::new(),
    })
}

/// Email a reset code.
///
/// Known and unknown addresses get the same response.
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.data());
    match auth
        .request_password_reset(&form.email, state.email(), chrono::Utc::now())
        .await
    {
        Ok(Some(pending)) => {
            shopper
                .session
                .insert(session_keys::PASSWORD_RESET, pending)
                .await?;
        }
        Ok(None) => {
            shopper
                .session
                .remove::<PendingReset>(session_keys::PASSWORD_RESET)
                .await?;
        }
        Err(e) => {
            let (status, message) = form_error(e)?;
            let page = ForgotPasswordTemplate {
                chrome: Chrome::load(&state, &shopper, "/auth/login").await?,
                error: Some(message),
                email: form.email,
            };
            return Ok((status, page).into_response());
        }
    }

    Ok(redirect_with(
        &shopper.session,
        Flash::info("If an account exists for that email, we have sent it a code"),
        "/auth/reset-password",
    )
    .await
    .into_response())
}

/// Display the reset password page.
pub async fn reset_password_page(
    State(state): State<AppState>,
    shopper: Shopper,
) -> Result<impl IntoResponse, AppError> {
    Ok(ResetPasswordTemplate {
        chrome: Chrome::load(&state, &shopper, "/auth/login").await?,
        error: None,
        ttl_minutes: RESET_CODE_TTL_MINUTES,
    })
}

/// Redeem a reset code and set the new password.
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    shopper: Shopper,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    if form.password != form.password_confirm {
        let message = "Passwords do not match".to_string();
        return reset_rejected(&state, &shopper, StatusCode::BAD_REQUEST, message).await;
    }

    let Some(mut pending) = pending_reset(&shopper).await else {
        let (status, message) = form_error(AuthError::InvalidResetCode)?;
        return reset_rejected(&state, &shopper, status, message).await;
    };

    let result = AuthService::new(state.data())
        .reset_password(&mut pending, &form.code, &form.password, chrono::Utc::now())
        .await;

    match result {
        Ok(user) => {
            shopper
                .session
                .remove::<PendingReset>(session_keys::PASSWORD_RESET)
                .await?;
            add_breadcrumb("auth", "Password reset", Some(&[("user_id", user.id.as_str())][..]));
            Ok(redirect_with(
                &shopper.session,
                Flash::success("Your password has been reset, please sign in"),
                "/auth/login",
            )
            .await
            .into_response())
        }
        Err(e @ (AuthError::ResetExpired | AuthError::TooManyAttempts)) => {
            shopper
                .session
                .remove::<PendingReset>(session_keys::PASSWORD_RESET)
                .await?;
            let message = AppError::from(e).public_message();
            Ok(redirect_with(
                &shopper.session,
                Flash::error(message),
                "/auth/forgot-password",
            )
            .await
            .into_response())
        }
        Err(e) => {
            // Keep the failed-attempt count.
            shopper
                .session
                .insert(session_keys::PASSWORD_RESET, &pending)
                .await?;
            let (status, message) = form_error(e)?;
            reset_rejected(&state, &shopper, status, message).await
        }
    }
}
