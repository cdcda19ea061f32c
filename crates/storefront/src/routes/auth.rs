//! Authentication route handlers.
//!
//! Email and password sign-up and sign-in against the backend auth service.
//! Tokens are kept in the session; signing in pulls the server cart into the
//! session cart.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::cart::{CartManager, CartState};
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, clear_stored_auth, set_stored_auth};
use crate::models::{AuthUser, SessionTokens, StoredAuth};
use crate::services::auth::{AuthService, AuthSession, check_admin_status};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Create an account.
///
/// Responds `201` with the new session, or `202` when the backend wants the
/// email confirmed before the first sign-in.
#[instrument(skip_all)]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignUpRequest>,
) -> Result<Response> {
    let service = AuthService::new(state.auth(), state.data().as_ref());
    let password = SecretString::from(form.password);
    let signup = service
        .sign_up(&form.email, &password, form.full_name.as_deref())
        .await?;

    match signup.tokens {
        Some(tokens) => {
            let auth = start_session(&state, &session, signup.user, tokens).await?;
            Ok((StatusCode::CREATED, Json(auth)).into_response())
        }
        None => {
            info!(user_id = %signup.user.id, "Sign-up awaiting email confirmation");
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "confirmation_required": true,
                    "user": signup.user,
                })),
            )
                .into_response())
        }
    }
}

/// Sign in with email and password.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInRequest>,
) -> Result<Json<AuthSession>> {
    let service = AuthService::new(state.auth(), state.data().as_ref());
    let password = SecretString::from(form.password);
    let grant = service.sign_in(&form.email, &password).await?;

    Ok(Json(
        start_session(&state, &session, grant.user, grant.tokens).await?,
    ))
}

/// Store the user in a fresh session and load their server cart.
async fn start_session(
    state: &AppState,
    session: &Session,
    user: AuthUser,
    tokens: SessionTokens,
) -> Result<AuthSession> {
    // New session ID on privilege change
    session.cycle_id().await?;
    set_stored_auth(
        session,
        &StoredAuth {
            user: user.clone(),
            tokens: tokens.clone(),
        },
    )
    .await?;
    set_sentry_user(&user.id, user.email.as_deref());

    let data = state.data().for_user(&tokens.access_token);
    let mut cart = CartManager::new(
        CartState::load(session).await,
        Arc::clone(&data),
        Some(user.id),
        state.outbox().clone(),
    );
    if let Err(e) = cart.load_cart().await {
        warn!(user_id = %user.id, error = %e, "Could not load server cart; keeping session cart");
    }
    cart.into_state().save(session).await?;

    let is_admin = check_admin_status(data.as_ref(), user.id).await;
    info!(user_id = %user.id, is_admin, "User signed in");

    Ok(AuthSession {
        user: Some(user),
        is_admin,
        is_loading: false,
    })
}

/// Sign out.
///
/// Revokes the backend session (best effort) and destroys the local
/// session, cart included.
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<StatusCode> {
    if let Some(user) = user {
        let service = AuthService::new(state.auth(), state.data().as_ref());
        if let Err(e) = service.sign_out(user.access_token()).await {
            warn!(user_id = %user.id(), error = %e, "Backend sign-out failed");
        }
    }

    clear_stored_auth(&session).await?;
    session.flush().await?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// The current auth session.
///
/// Validates the stored access token with the auth service, so a revoked
/// token reads as signed out.
#[instrument(skip_all)]
pub async fn session(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Json<AuthSession> {
    let mut auth = AuthSession::loading();
    auth.initialize(
        state.auth(),
        state.data().as_ref(),
        user.as_ref().map(|u| u.access_token()),
    )
    .await;
    Json(auth)
}
