//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `BAZAAR_BASE_URL` - Public URL of the shop front end (used in password reset links)
//! - `ACCESS_TOKEN_SECRET` - HMAC secret for access tokens (min 32 chars, high entropy)
//! - `REFRESH_TOKEN_SECRET` - HMAC secret for refresh tokens (min 32 chars, high entropy)
//! - `RESET_TOKEN_SECRET` - HMAC secret for password reset tokens (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 5000)
//! - `BAZAAR_RATE_LIMIT` - Rate limit `/api/auth` per client IP (default: true)
//! - `REDIS_URL` - Redis URL for the session cache (default: in-process cache)
//! - `REDIS_POOL_SIZE` - Redis connection pool size (default: 16)
//! - `SMTP_HOST` - SMTP relay; when unset, outgoing email is only logged
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `SMTP_USERNAME` / `SMTP_PASSWORD` - SMTP credentials (required with `SMTP_HOST`)
//! - `EMAIL_FROM` - Sender address (default: `SMTP_USERNAME`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error event sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
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
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the shop front end
    pub base_url: String,
    /// Whether `/api/auth` is rate limited per client IP
    pub rate_limit: bool,
    /// Signing secrets for the three token kinds
    pub tokens: TokenSecrets,
    /// Redis session cache; `None` selects the in-process cache
    pub redis: Option<RedisConfig>,
    /// SMTP delivery; `None` logs outgoing email instead
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate
    pub sentry_traces_sample_rate: f32,
}

/// HMAC secrets for signed tokens.
///
/// Each token kind has its own secret so a token of one kind can never verify
/// as another. Built explicitly and injected into the token service, so tests
/// can use distinct secrets per case.
///
/// Implements `Debug` manually to redact all fields.
#[derive(Clone)]
pub struct TokenSecrets {
    /// Secret for 15-minute access tokens
    pub access: SecretString,
    /// Secret for 7-day refresh tokens
    pub refresh: SecretString,
    /// Secret for 15-minute password reset tokens
    pub reset: SecretString,
}

impl std::fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecrets")
            .field("access", &"[REDACTED]")
            .field("refresh", &"[REDACTED]")
            .field("reset", &"[REDACTED]")
            .finish()
    }
}

/// Redis connection settings.
///
/// Implements `Debug` manually because the URL may embed a password.
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: SecretString,
    /// Maximum pooled connections
    pub pool_size: usize,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &"[REDACTED]")
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// SMTP settings for transactional email.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port (STARTTLS)
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: SecretString,
    /// Sender address
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
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
    /// if secrets fail validation (length, placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BAZAAR_DATABASE_URL")?;
        let host = parse_env("BAZAAR_HOST", "127.0.0.1")?;
        let port = parse_env("BAZAAR_PORT", "5000")?;
        let rate_limit = parse_env("BAZAAR_RATE_LIMIT", "true")?;

        let base_url = get_required_env("BAZAAR_BASE_URL")?;
        validate_base_url(&base_url, "BAZAAR_BASE_URL")?;

        let tokens = TokenSecrets::from_env()?;
        let redis = RedisConfig::from_env()?;
        let email = EmailConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url: base_url.trim_end_matches('/').to_owned(),
            rate_limit,
            tokens,
            redis,
            email,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl TokenSecrets {
    fn from_env() -> Result<Self, ConfigError> {
        let secrets = Self {
            access: get_validated_secret("ACCESS_TOKEN_SECRET")?,
            refresh: get_validated_secret("REFRESH_TOKEN_SECRET")?,
            reset: get_validated_secret("RESET_TOKEN_SECRET")?,
        };
        secrets.ensure_distinct()?;
        Ok(secrets)
    }

    /// Reject configurations that reuse one secret for two token kinds.
    fn ensure_distinct(&self) -> Result<(), ConfigError> {
        let access = self.access.expose_secret();
        let refresh = self.refresh.expose_secret();
        let reset = self.reset.expose_secret();

        if access == refresh || access == reset || refresh == reset {
            return Err(ConfigError::InsecureSecret(
                "ACCESS_TOKEN_SECRET/REFRESH_TOKEN_SECRET/RESET_TOKEN_SECRET".to_string(),
                "each token kind needs its own secret".to_string(),
            ));
        }
        Ok(())
    }
}

impl RedisConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(url) = get_optional_env("REDIS_URL") else {
            return Ok(None);
        };
        Ok(Some(Self {
            url: SecretString::from(url),
            pool_size: parse_env("REDIS_POOL_SIZE", "16")?,
        }))
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        let smtp_username = get_required_env("SMTP_USERNAME")?;
        let from_address =
            get_optional_env("EMAIL_FROM").unwrap_or_else(|| smtp_username.clone());

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address,
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

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that the base URL is an absolute http(s) URL.
fn validate_base_url(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(())
}

/// Validate that a token secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
    let len = s.chars().count() as f64;
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

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
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

/// Load and validate a token secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_secret(key)?;
    validate_secret_length(&value, key)?;
    validate_secret_strength(value.expose_secret(), key)?;
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secrets(access: &str, refresh: &str, reset: &str) -> TokenSecrets {
        TokenSecrets {
            access: SecretString::from(access),
            refresh: SecretString::from(refresh),
            reset: SecretString::from(reset),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_single_char() {
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("changeme-access-token-value-1234", "ACCESS");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "ACCESS");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "ACCESS");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "ACCESS").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "ACCESS").is_ok());
    }

    #[test]
    fn test_token_secrets_must_differ() {
        let same = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";
        assert!(secrets(same, same, "Zq8%Lm2#Vn6!Rt4&Wy0*Hc3^Kd7@Pf1").ensure_distinct().is_err());
        assert!(
            secrets(
                same,
                "Zq8%Lm2#Vn6!Rt4&Wy0*Hc3^Kd7@Pf1",
                "Gh5!Jk9@Mn3#Qw7$Er1%Ty4^Ui8&Op2"
            )
            .ensure_distinct()
            .is_ok()
        );
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://shop.example.com", "BASE").is_ok());
        assert!(validate_base_url("ftp://shop.example.com", "BASE").is_err());
        assert!(validate_base_url("not a url", "BASE").is_err());
    }

    #[test]
    fn test_token_secrets_debug_redacts() {
        let debug_output = format!(
            "{:?}",
            secrets("first-secret-value", "second-secret-value", "third-secret-value")
        );
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("first-secret-value"));
        assert!(!debug_output.contains("third-secret-value"));
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.mail.test".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("hunter2-smtp"),
            from_address: "shop@mail.test".to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.mail.test"));
        assert!(!debug_output.contains("hunter2-smtp"));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:3000".to_string(),
            rate_limit: false,
            tokens: secrets("a", "b", "c"),
            redis: None,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
        assert!(!config.secure_cookies());
    }
}
