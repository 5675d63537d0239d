//! Transactional email API client.
//!
//! Sends password-reset codes through an EmailJS-style endpoint: a single JSON
//! `POST` naming the service, the template and the template parameters. When
//! no email API is configured the client runs in development mode and writes
//! the code to the log instead.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use verdora_core::Email;

use crate::config::EmailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Request body for the send endpoint.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken")]
    access_token: &'a str,
    template_params: ResetParams<'a>,
}

#[derive(Debug, Serialize)]
struct ResetParams<'a> {
    to_email: &'a str,
    to_name: &'a str,
    passcode: &'a str,
    time: String,
}

/// Email API client. Cheap to clone.
#[derive(Clone)]
pub struct EmailClient {
    client: reqwest::Client,
    config: Option<EmailConfig>,
}

impl std::fmt::Debug for EmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EmailClient {
    /// Create a client; `None` selects development mode.
    #[must_use]
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Whether messages actually leave the process.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Send a password-reset code.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails.
    #[instrument(skip(self, code), fields(to = %to))]
    pub async fn send_reset_code(
        &self,
        to: &Email,
        name: &str,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), MailError> {
        let Some(config) = &self.config else {
            tracing::info!(
                to = %to,
                code,
                expires_at = %expires_at,
                "Email API not configured; password reset code"
            );
            return Ok(());
        };

        let body = SendRequest {
            service_id: &config.service_id,
            template_id: &config.template_id,
            user_id: &config.public_key,
            access_token: config.access_token.expose_secret(),
            template_params: ResetParams {
                to_email: to.as_str(),
                to_name: name,
                passcode: code,
                time: expires_at.format("%H:%M UTC").to_string(),
            },
        };

        let response = self
            .client
            .post(config.api_url.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %to, "Password reset email sent");
        Ok(())
    }
}
