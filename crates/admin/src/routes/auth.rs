//! Admin sign-in, sign-out and session.
//!
//! Admins sign in with their storefront account. The account's profile must
//! carry `is_admin`; anyone else is signed straight back out.

use axum::{Json, extract::State, http::StatusCode};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use fernleaf_storefront::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use fernleaf_storefront::middleware::{OptionalAuth, clear_stored_auth, set_stored_auth};
use fernleaf_storefront::models::StoredAuth;
use fernleaf_storefront::services::auth::{AuthService, AuthSession, check_admin_status};

use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Sign in with email and password. Non-admins get `403` and no session.
#[instrument(skip_all)]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInRequest>,
) -> Result<Json<AuthSession>> {
    let service = AuthService::new(state.auth(), state.data().as_ref());
    let password = SecretString::from(form.password);
    let grant = service.sign_in(&form.email, &password).await?;

    let scoped = state.data().for_user(&grant.tokens.access_token);
    if !check_admin_status(scoped.as_ref(), grant.user.id).await {
        warn!(user_id = %grant.user.id, "Admin sign-in refused for non-admin");
        if let Err(e) = service.sign_out(&grant.tokens.access_token).await {
            warn!(user_id = %grant.user.id, error = %e, "Backend sign-out failed");
        }
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    session.cycle_id().await?;
    set_stored_auth(
        &session,
        &StoredAuth {
            user: grant.user.clone(),
            tokens: grant.tokens,
        },
    )
    .await?;
    set_sentry_user(&grant.user.id, grant.user.email.as_deref());
    info!(user_id = %grant.user.id, "Admin signed in");

    Ok(Json(AuthSession {
        user: Some(grant.user),
        is_admin: true,
        is_loading: false,
    }))
}

/// Sign out and destroy the admin session.
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

/// Who is signed in to the dashboard, re-checking the admin flag.
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
