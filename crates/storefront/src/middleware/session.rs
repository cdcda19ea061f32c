//! Session middleware configuration.
//!
//! Sessions are held in process memory and identified by a signed cookie.
//! They carry the visitor's cart and, once signed in, their backend tokens.

use secrecy::{ExposeSecret, SecretString};
use tower_sessions::cookie::{Key, KeyError, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Storefront session cookie name.
pub const SESSION_COOKIE_NAME: &str = "fernleaf_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// The session layer both servers install.
pub type SessionLayer = SessionManagerLayer<MemoryStore, SignedCookie>;

/// Create the session layer.
///
/// # Arguments
///
/// * `cookie_name` - Name of the session cookie
/// * `secret` - Cookie signing secret (at least 64 bytes)
/// * `secure` - Whether the cookie is only sent over HTTPS
///
/// # Errors
///
/// Returns `KeyError` if `secret` is too short to derive a signing key.
pub fn create_session_layer(
    cookie_name: &'static str,
    secret: &SecretString,
    secure: bool,
) -> Result<SessionLayer, KeyError> {
    let key = Key::try_from(secret.expose_secret().as_bytes())?;

    Ok(SessionManagerLayer::new(MemoryStore::default())
        .with_name(cookie_name)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_secret_rejected() {
        let secret = SecretString::from("too-short");
        assert!(create_session_layer(SESSION_COOKIE_NAME, &secret, false).is_err());
    }

    #[test]
    fn test_long_secret_accepted() {
        let secret = SecretString::from("k".repeat(64));
        assert!(create_session_layer(SESSION_COOKIE_NAME, &secret, true).is_ok());
    }
}
