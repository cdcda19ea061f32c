//! Fernleaf Admin library.
//!
//! The admin dashboard API as a library, so the binary and the integration
//! tests share it.
//!
//! # Security
//!
//! The admin server holds no service-role credentials. Every change is made
//! with the signed-in admin's own access token, so the backend's row-level
//! security policies (which check `user_profiles.is_admin`) are the final
//! gate; [`middleware::RequireAdmin`] refuses non-admins before any call is
//! made.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, routing::get};
use fernleaf_storefront::middleware::{create_session_layer, request_id_middleware};
use fernleaf_storefront::routes::health;
use fernleaf_storefront::trace_layer;
use tower_sessions::cookie::KeyError;

use crate::state::AppState;

/// Admin session cookie; separate from the storefront's.
pub const SESSION_COOKIE_NAME: &str = "fernleaf_admin_session";

/// Build the admin router with its session, request ID and tracing layers.
/// Sentry layers are added by the binary.
///
/// # Errors
///
/// Returns `KeyError` if the session secret cannot be used as a signing key.
pub fn app(state: AppState) -> Result<Router, KeyError> {
    let session_layer = create_session_layer(
        SESSION_COOKIE_NAME,
        &state.config().session_secret,
        state.config().is_https(),
    )?;

    Ok(Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<AppState>))
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(trace_layer())
        .with_state(state))
}
