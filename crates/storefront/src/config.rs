//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_JWT_SECRET` - Bearer token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 8080)
//! - `STOREFRONT_TOKEN_TTL_SECS` - Bearer token lifetime (default: 3600)
//! - `STOREFRONT_RATE_LIMIT` - Rate limit `/sessions` by client IP (default: true)
//! - `ADMIN_EMAIL` / `ADMIN_PASSWORD` - Admin bootstrap credentials (set both or neither)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` - Mail sender
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
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
    /// Bearer token signing secret
    pub jwt_secret: SecretString,
    /// Bearer token lifetime
    pub token_ttl: Duration,
    /// Whether `/sessions` endpoints are rate limited per client IP
    pub rate_limit: bool,
    /// Admin bootstrap credentials (signup with these gets the admin role)
    pub admin: Option<AdminBootstrapConfig>,
    /// SMTP configuration for purchase confirmations
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Credentials that mark a signup as the store administrator.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct AdminBootstrapConfig {
    /// Administrator email address
    pub email: String,
    /// Administrator password
    pub password: SecretString,
}

impl std::fmt::Debug for AdminBootstrapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrapConfig")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// SMTP configuration for outbound mail.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
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
    /// if the signing secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "8080")?;

        let jwt_secret = get_required_env("STOREFRONT_JWT_SECRET")?;
        check_signing_secret(&jwt_secret, "STOREFRONT_JWT_SECRET")?;
        let jwt_secret = SecretString::from(jwt_secret);

        let ttl_secs: i64 = parse_env(
            "STOREFRONT_TOKEN_TTL_SECS",
            &DEFAULT_TOKEN_TTL_SECS.to_string(),
        )?;
        if ttl_secs <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_TOKEN_TTL_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let rate_limit = parse_env("STOREFRONT_RATE_LIMIT", "true")?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            token_ttl: Duration::seconds(ttl_secs),
            rate_limit,
            admin: AdminBootstrapConfig::from_env()?,
            email: EmailConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// A configuration suitable for in-process tests: no database URL, no mail,
    /// no rate limiting, one hour tokens.
    #[cfg(any(test, feature = "test-utils"))]
    #[must_use]
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/estore_test"),
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            jwt_secret: SecretString::from(jwt_secret.to_owned()),
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            rate_limit: false,
            admin: None,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        }
    }
}

impl AdminBootstrapConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        match (
            get_optional_env("ADMIN_EMAIL"),
            get_optional_env("ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Ok(Some(Self {
                email,
                password: SecretString::from(password),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ConfigError::MissingEnvVar("ADMIN_PASSWORD".to_string())),
            (None, Some(_)) => Err(ConfigError::MissingEnvVar("ADMIN_EMAIL".to_string())),
        }
    }
}

impl EmailConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("EMAIL_FROM")?,
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
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Parse an environment variable, using `default` when it is unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Bits of Shannon entropy per character.
fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0_u32;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .into_values()
        .map(|n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject short, placeholder or low-entropy signing secrets.
fn check_signing_secret(secret: &str, var: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| ConfigError::InsecureSecret(var.to_owned(), reason);

    let len = secret.chars().count();
    if len < MIN_JWT_SECRET_LENGTH {
        return Err(insecure(format!(
            "must be at least {MIN_JWT_SECRET_LENGTH} characters (got {len})"
        )));
    }

    let lower = secret.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(insecure(format!("looks like a placeholder ('{pattern}')")));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(insecure(format!(
            "entropy {entropy:.2} bits/char is below {MIN_ENTROPY_BITS_PER_CHAR:.1}; generate it randomly"
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("zzzzzz") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("Qm7#vL2@pX9!kR4$") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_signing_secret_checks() {
        let strong = "Qm7#vL2@pX9!kR4$wT6^yU8&zN3*bH5%";
        assert!(check_signing_secret(strong, "JWT").is_ok());

        let repetitive = "ab".repeat(20);
        for weak in [
            "Qm7#vL2@",
            "changeme-jwt-signing-key-2024-abcdefgh",
            repetitive.as_str(),
        ] {
            assert!(matches!(
                check_signing_secret(weak, "JWT"),
                Err(ConfigError::InsecureSecret(_, _))
            ));
        }
    }

    #[test]
    fn test_socket_addr() {
        let mut config = StorefrontConfig::for_tests("Qm7#vL2@pX9!kR4$wT6^yU8&zN3*bH5%");
        config.port = 8080;
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let admin = AdminBootstrapConfig {
            email: "owner@estore.com".to_string(),
            password: SecretString::from("hunter2-but-longer"),
        };
        let email = EmailConfig {
            smtp_host: "smtp.estore.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("smtp-super-secret"),
            from_address: "E-Store <no-reply@estore.com>".to_string(),
        };

        let admin_debug = format!("{admin:?}");
        assert!(admin_debug.contains("owner@estore.com"));
        assert!(!admin_debug.contains("hunter2"));

        let email_debug = format!("{email:?}");
        assert!(email_debug.contains("smtp.estore.com"));
        assert!(email_debug.contains("[REDACTED]"));
        assert!(!email_debug.contains("smtp-super-secret"));
    }
}
