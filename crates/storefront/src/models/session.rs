//! Session-related types.
//!
//! Types stored in the visitor's session: the signed-in user with their
//! backend tokens, and (under [`session_keys::CART`]) the local cart.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use fernleaf_core::UserId;

/// The backend's view of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// Access and refresh tokens issued by the auth service.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SessionTokens {
    /// Refresh this long before the access token actually expires.
    const REFRESH_MARGIN_SECS: i64 = 30;

    /// Whether the access token is expired or about to be.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(Self::REFRESH_MARGIN_SECS) <= now
    }
}

/// Session-stored identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAuth {
    pub user: AuthUser,
    pub tokens: SessionTokens,
}

/// Session keys.
pub mod session_keys {
    /// The signed-in user and tokens ([`super::StoredAuth`]).
    pub const AUTH: &str = "fernleaf-auth";

    /// The visitor's cart.
    pub const CART: &str = "fernleaf-cart";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_debug_redacts() {
        let tokens = SessionTokens {
            access_token: "eyJhbGciOi.secret-access".to_string(),
            refresh_token: "refresh-secret".to_string(),
            expires_at: Utc::now(),
        };
        let debug = format!("{tokens:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("refresh-secret"));
    }

    #[test]
    fn test_needs_refresh_inside_margin() {
        let now = Utc::now();
        let tokens = SessionTokens {
            access_token: String::new(),
            refresh_token: String::new(),
            expires_at: now + Duration::seconds(10),
        };
        assert!(tokens.needs_refresh(now));

        let fresh = SessionTokens {
            expires_at: now + Duration::hours(1),
            ..tokens
        };
        assert!(!fresh.needs_refresh(now));
    }
}
