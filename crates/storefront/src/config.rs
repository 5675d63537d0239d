//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VERDORA_BASE_URL` - Public URL for the storefront
//!
//! ## Optional
//! - `VERDORA_HOST` - Bind address (default: 127.0.0.1)
//! - `VERDORA_PORT` - Listen port (default: 3000)
//! - `VERDORA_DATA_URL` - REST data endpoint (default: <http://localhost:3001>)
//! - `VERDORA_DATABASE_URL` / `DATABASE_URL` - `PostgreSQL` for sessions and the
//!   client store; when unset both live in memory
//! - `VERDORA_LOW_STOCK_THRESHOLD` - Report threshold (default: 5)
//! - `VERDORA_AUTH_BURST` - Auth form posts allowed in a burst per IP (default: 5)
//! - `EMAIL_API_URL`, `EMAIL_SERVICE_ID`, `EMAIL_TEMPLATE_ID`,
//!   `EMAIL_PUBLIC_KEY`, `EMAIL_ACCESS_TOKEN` - Transactional email API used for
//!   password-reset codes; all five or none
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` connection URL; `None` keeps sessions and carts in memory
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Base URL of the REST data endpoint
    pub data_url: Url,
    /// Stock level at or below which products are reported as low
    pub low_stock_threshold: u32,
    /// Burst size of the auth rate limiter
    pub auth_burst: u32,
    /// Transactional email API; `None` logs reset codes instead
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Transactional email API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct EmailConfig {
    /// Send endpoint, e.g. `https://api.emailjs.com/api/v1.0/email/send`
    pub api_url: Url,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    /// Private access token (server-side only)
    pub access_token: SecretString,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_url", &self.api_url.as_str())
            .field("service_id", &self.service_id)
            .field("template_id", &self.template_id)
            .field("public_key", &self.public_key)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("VERDORA_HOST", "127.0.0.1")?;
        let port = parse_env("VERDORA_PORT", "3000")?;
        let base_url = get_required_env("VERDORA_BASE_URL")?;
        let data_url = parse_env("VERDORA_DATA_URL", "http://localhost:3001")?;
        let low_stock_threshold = parse_env("VERDORA_LOW_STOCK_THRESHOLD", "5")?;
        let auth_burst = parse_env("VERDORA_AUTH_BURST", "5")?;

        Ok(Self {
            database_url: get_database_url("VERDORA_DATABASE_URL"),
            host,
            port,
            base_url,
            data_url,
            low_stock_threshold,
            auth_burst,
            email: EmailConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// In-memory configuration against a given data endpoint.
    ///
    /// No database, no email API, no Sentry. Used for local development
    /// and by the integration tests.
    #[must_use]
    pub fn local(data_url: Url) -> Self {
        Self {
            database_url: None,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            data_url,
            low_stock_threshold: 5,
            auth_burst: 5,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl EmailConfig {
    /// Load the email group. Either every variable is set or none is.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(api_url) = get_optional_env("EMAIL_API_URL") else {
            return Ok(None);
        };
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("EMAIL_API_URL".to_string(), e.to_string()))?;

        Ok(Some(Self {
            api_url,
            service_id: get_required_env("EMAIL_SERVICE_ID")?,
            template_id: get_required_env("EMAIL_TEMPLATE_ID")?,
            public_key: get_required_env("EMAIL_PUBLIC_KEY")?,
            access_token: get_validated_secret("EMAIL_ACCESS_TOKEN")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to a default.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.3);
    }

    #[test]
    fn test_placeholder_tokens_rejected() {
        for token in ["your-emailjs-token", "changeme123", "SECRET_TOKEN_HERE"] {
            assert!(matches!(
                validate_secret_strength(token, "EMAIL_ACCESS_TOKEN"),
                Err(ConfigError::InsecureSecret(_, _))
            ));
        }
    }

    #[test]
    fn test_low_entropy_token_rejected() {
        assert!(validate_secret_strength("abababababababab", "EMAIL_ACCESS_TOKEN").is_err());
        assert!(validate_secret_strength("k9Qz!T2v#Lm8@pR4wX7&", "EMAIL_ACCESS_TOKEN").is_ok());
    }

    #[test]
    fn test_local_config() {
        let config = StorefrontConfig::local(Url::parse("http://127.0.0.1:4010").unwrap());
        assert!(config.database_url.is_none());
        assert!(config.email.is_none());
        assert!(!config.is_https());
        assert_eq!(config.socket_addr().port(), 3000);
        assert_eq!(config.data_url.port(), Some(4010));
    }

    #[test]
    fn test_email_config_debug_redacts_token() {
        let config = EmailConfig {
            api_url: Url::parse("https://api.emailjs.com/api/v1.0/email/send").unwrap(),
            service_id: "service_greenhouse".to_string(),
            template_id: "template_reset".to_string(),
            public_key: "pk_live_visible".to_string(),
            access_token: SecretString::from("tok_very_private_value"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("service_greenhouse"));
        assert!(debug_output.contains("pk_live_visible"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("tok_very_private_value"));
    }
}
