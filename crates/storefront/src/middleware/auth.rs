//! Authentication middleware and extractors.
//!
//! The signed-in user lives in the session as a [`StoredAuth`]. The
//! extractors refresh the access token when it is about to expire and hand
//! handlers a backend client scoped to the user, so RLS sees the caller.

use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::{debug, warn};

use fernleaf_core::UserId;

use crate::backend::prelude::*;
use crate::models::{AuthUser, SessionTokens, StoredAuth, session_keys};
use crate::services::auth::AuthService;

/// State that can resolve a session to a signed-in user.
///
/// Implemented by the storefront and admin `AppState`s so both servers share
/// these extractors.
pub trait BackendState: Clone + Send + Sync + 'static {
    fn auth_client(&self) -> &dyn AuthClient;
    fn data_client(&self) -> &Arc<dyn DataClient>;
}

/// The signed-in user for the current request.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: AuthUser,
    pub tokens: SessionTokens,
    /// Backend client acting as this user.
    pub data: Arc<dyn DataClient>,
}

impl CurrentUser {
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.user.id
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.tokens.access_token
    }
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("user", &self.user)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.id())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when a request needs a signed-in user and has none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Nobody is signed in.
    Unauthorized,
    /// The session's tokens could not be refreshed.
    SessionExpired,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            Self::Unauthorized => "Sign in required",
            Self::SessionExpired => "Session expired, please sign in again",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": message })),
        )
            .into_response()
    }
}

impl<S: BackendState> FromRequestParts<S> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await.map(Self)
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this never rejects; an expired session reads as
/// signed out.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S: BackendState> FromRequestParts<S> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await.ok()))
    }
}

async fn resolve<S: BackendState>(parts: &Parts, state: &S) -> Result<CurrentUser, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    let stored: StoredAuth = session
        .get(session_keys::AUTH)
        .await
        .ok()
        .flatten()
        .ok_or(AuthRejection::Unauthorized)?;

    let stored = if stored.tokens.needs_refresh(Utc::now()) {
        refresh(session, state, &stored).await?
    } else {
        stored
    };

    let data = state.data_client().for_user(&stored.tokens.access_token);
    Ok(CurrentUser {
        user: stored.user,
        tokens: stored.tokens,
        data,
    })
}

async fn refresh<S: BackendState>(
    session: &Session,
    state: &S,
    stored: &StoredAuth,
) -> Result<StoredAuth, AuthRejection> {
    let service = AuthService::new(state.auth_client(), state.data_client().as_ref());

    match service.refresh(&stored.tokens).await {
        Ok(grant) => {
            debug!(user_id = %grant.user.id, "Access token refreshed");
            let refreshed = StoredAuth {
                user: grant.user,
                tokens: grant.tokens,
            };
            if let Err(e) = set_stored_auth(session, &refreshed).await {
                warn!(error = %e, "Failed to store refreshed tokens");
            }
            Ok(refreshed)
        }
        Err(e) => {
            debug!(user_id = %stored.user.id, error = %e, "Token refresh failed; signing out");
            if let Err(e) = clear_stored_auth(session).await {
                warn!(error = %e, "Failed to clear expired session");
            }
            Err(AuthRejection::SessionExpired)
        }
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_stored_auth(
    session: &Session,
    auth: &StoredAuth,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::AUTH, auth).await
}

/// Remove the signed-in user from the session (sign-out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_stored_auth(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<StoredAuth>(session_keys::AUTH).await?;
    Ok(())
}
