//! Authentication service.
//!
//! Thin wrappers over the backend auth API: sign-up (plus the profile row),
//! password sign-in, sign-out and token refresh.

mod error;
mod session;

pub use error::AuthError;
pub use session::{AuthSession, SessionHolder, check_admin_status};

use secrecy::{ExposeSecret, SecretString};
use tracing::{instrument, warn};

use fernleaf_core::Email;

use crate::backend::prelude::*;
use crate::backend::{AuthGrant, BackendError, SignUp};
use crate::models::{AuthUser, NewProfile, SessionTokens};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    auth: &'a dyn AuthClient,
    data: &'a dyn DataClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(auth: &'a dyn AuthClient, data: &'a dyn DataClient) -> Self {
        Self { auth, data }
    }

    /// Register a new account and create its profile row.
    ///
    /// A failed profile insert is logged and ignored; the account exists
    /// either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        full_name: Option<&str>,
    ) -> Result<SignUp, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password.expose_secret())?;

        let signup = self
            .auth
            .sign_up(&email, password, full_name)
            .await
            .map_err(|e| match e {
                BackendError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Backend(other),
            })?;

        let profile = NewProfile {
            id: signup.user.id,
            email: email.into_inner(),
            full_name: full_name.map(str::to_string),
        };
        let result = match &signup.tokens {
            Some(tokens) => {
                self.data
                    .for_user(&tokens.access_token)
                    .create_profile(&profile)
                    .await
            }
            None => self.data.create_profile(&profile).await,
        };
        if let Err(e) = result {
            warn!(user_id = %signup.user.id, error = %e, "Profile row not created at sign-up");
        }

        Ok(signup)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthGrant, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        self.auth
            .sign_in(&email, password)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized | BackendError::NotFound(_) => {
                    AuthError::InvalidCredentials
                }
                other => AuthError::Backend(other),
            })
    }

    /// Revoke the session behind `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend` if the auth service fails.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.auth.sign_out(access_token).await?;
        Ok(())
    }

    /// Exchange the refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the refresh token is rejected.
    #[instrument(skip_all)]
    pub async fn refresh(&self, tokens: &SessionTokens) -> Result<AuthGrant, AuthError> {
        self.auth
            .refresh_session(&tokens.refresh_token)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized | BackendError::Forbidden => AuthError::SessionExpired,
                e if e.is_client_error() => AuthError::SessionExpired,
                other => AuthError::Backend(other),
            })
    }

    /// The user behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the token is not accepted.
    pub async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        self.auth
            .get_user(access_token)
            .await
            .map_err(|e| match e {
                BackendError::Unauthorized => AuthError::SessionExpired,
                other => AuthError::Backend(other),
            })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Validate password requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
