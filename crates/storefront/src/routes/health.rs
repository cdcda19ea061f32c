//! Liveness and readiness checks.

use axum::{extract::State, http::StatusCode};

use crate::middleware::BackendState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the backend answers before returning OK.
/// Returns 503 Service Unavailable if it does not.
pub async fn readiness<S: BackendState>(State(state): State<S>) -> StatusCode {
    match state.data_client().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
