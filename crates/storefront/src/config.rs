//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FERNLEAF_BACKEND_URL` - Base URL of the managed backend project
//! - `FERNLEAF_BACKEND_ANON_KEY` - Public anon key sent as `apikey` on every call
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session cookie signing secret (min 64 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STORAGE_BUCKET` - Product image bucket (default: product-images)
//! - `CHECKOUT_TAX_RATE` - Tax rate applied to the subtotal (default: 0.08)
//! - `CHECKOUT_SHIPPING_FLAT` - Flat shipping charge (default: 5.00)
//! - `CHECKOUT_FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is free
//! - `IMAGE_FALLBACK_URL` - Image shown when a product image cannot load
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use fernleaf_core::Price;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::services::checkout::CheckoutPricing;

const MIN_SESSION_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Bucket holding product images.
pub const DEFAULT_STORAGE_BUCKET: &str = "product-images";

/// Image served when a product image cannot be loaded.
pub const DEFAULT_IMAGE_FALLBACK_URL: &str = "/static/placeholder-product.svg";

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
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session cookie signing secret
    pub session_secret: SecretString,
    /// Managed backend connection
    pub backend: BackendConfig,
    /// Tax and shipping rules applied at checkout
    pub checkout: CheckoutPricing,
    /// Image shown when a product image cannot load
    pub image_fallback_url: String,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Connection details for the managed backend.
///
/// Implements `Debug` manually to redact the anon key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project base URL, always ending in `/`
    pub url: Url,
    /// Anon key sent as `apikey` and as the bearer for anonymous calls
    pub anon_key: SecretString,
    /// Storage bucket for product images
    pub storage_bucket: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("storage_bucket", &self.storage_bucket)
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

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            backend: BackendConfig::from_env()?,
            checkout: checkout_pricing_from_env()?,
            image_fallback_url: get_env_or_default(
                "IMAGE_FALLBACK_URL",
                DEFAULT_IMAGE_FALLBACK_URL,
            ),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over TLS (secure cookies).
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    /// Load the backend connection from `FERNLEAF_BACKEND_*` and `STORAGE_BUCKET`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL or anon key is missing or the URL
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = get_required_env("FERNLEAF_BACKEND_URL")?;
        let url = Url::parse(&raw).map_err(|e| {
            ConfigError::InvalidEnvVar("FERNLEAF_BACKEND_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            url: with_trailing_slash(url),
            anon_key: get_required_secret("FERNLEAF_BACKEND_ANON_KEY")?,
            storage_bucket: get_env_or_default("STORAGE_BUCKET", DEFAULT_STORAGE_BUCKET),
        })
    }

    /// A backend connection with the default bucket.
    #[must_use]
    pub fn new(url: Url, anon_key: SecretString) -> Self {
        Self {
            url: with_trailing_slash(url),
            anon_key,
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(url: &str) -> Self {
        Self::new(
            Url::parse(url).unwrap_or_else(|e| panic!("{url}: {e}")),
            SecretString::from("test-anon-key"),
        )
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn checkout_pricing_from_env() -> Result<CheckoutPricing, ConfigError> {
    let tax_rate: Decimal = parse_env("CHECKOUT_TAX_RATE", "0.08")?;
    if tax_rate.is_sign_negative() || tax_rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "CHECKOUT_TAX_RATE".to_string(),
            format!("must be in [0, 1) (got {tax_rate})"),
        ));
    }

    let shipping_flat = parse_price(
        "CHECKOUT_SHIPPING_FLAT",
        &get_env_or_default("CHECKOUT_SHIPPING_FLAT", "5.00"),
    )?;
    let free_shipping_threshold = get_optional_env("CHECKOUT_FREE_SHIPPING_THRESHOLD")
        .map(|raw| parse_price("CHECKOUT_FREE_SHIPPING_THRESHOLD", &raw))
        .transpose()?;

    Ok(CheckoutPricing {
        tax_rate,
        shipping_flat,
        free_shipping_threshold,
    })
}

fn parse_price(key: &str, raw: &str) -> Result<Price, ConfigError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Price::new(amount).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if the variable is unset.
pub fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable. Empty values count as unset.
#[must_use]
pub fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
#[must_use]
pub fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if the value does not parse.
pub fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
///
/// # Errors
///
/// Returns `ConfigError::InsecureSecret` if the secret is too short.
pub fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
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

/// Load and validate a secret from environment.
///
/// # Errors
///
/// Returns `ConfigError` if the variable is unset, looks like a placeholder,
/// or has too little entropy.
pub fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

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
        let result = validate_secret_strength("your-session-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(40), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_length() {
        let short = SecretString::from("k".repeat(63));
        assert!(validate_session_secret(&short, "TEST_SESSION").is_err());
        let long = SecretString::from("k".repeat(64));
        assert!(validate_session_secret(&long, "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_backend_url_gets_trailing_slash() {
        let config = BackendConfig::for_tests("https://project.backend.test/base");
        assert_eq!(config.url.as_str(), "https://project.backend.test/base/");
        assert_eq!(
            config.url.join("rest/v1/").unwrap().as_str(),
            "https://project.backend.test/base/rest/v1/"
        );
    }

    #[test]
    fn test_backend_config_debug_redacts_key() {
        let config = BackendConfig {
            url: Url::parse("https://project.backend.test/").unwrap(),
            anon_key: SecretString::from("eyJhbGciOiJIUzI1NiJ9.anon"),
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("project.backend.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("eyJhbGciOiJIUzI1NiJ9"));
    }

    #[test]
    fn test_parse_price_rejects_negative() {
        assert!(parse_price("CHECKOUT_SHIPPING_FLAT", "-1").is_err());
        assert_eq!(
            parse_price("CHECKOUT_SHIPPING_FLAT", " 5.00 ").unwrap(),
            Price::from_cents(500).unwrap()
        );
    }
}
