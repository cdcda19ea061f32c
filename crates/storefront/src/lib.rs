//! Fernleaf Storefront library.
//!
//! The storefront API as a library, so the binary, the admin server and the
//! integration tests share it. Besides the HTTP surface it holds everything
//! both servers build on: the backend clients and their in-memory stand-in,
//! the cart, auth, analytics, checkout and image services.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod error;
pub mod images;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{Router, http::Request, http::Response, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::cookie::KeyError;
use tracing::Span;

use crate::middleware::{create_session_layer, request_id_middleware, session::SESSION_COOKIE_NAME};
use crate::state::AppState;

/// Build the storefront router with its session, request ID and tracing
/// layers. Sentry layers are added by the binary.
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
        .route("/health", get(routes::health::health))
        .route("/health/ready", get(routes::health::readiness::<AppState>))
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(trace_layer())
        .with_state(state))
}

/// HTTP tracing with a span per request that records status, latency and
/// the request ID.
#[must_use]
pub fn trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    impl Fn(&Request<axum::body::Body>) -> Span + Clone,
    tower_http::trace::DefaultOnRequest,
    impl Fn(&Response<axum::body::Body>, Duration, &Span) + Clone,
> {
    TraceLayer::new_for_http()
        .make_span_with(|request: &Request<axum::body::Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                status = tracing::field::Empty,
                latency_ms = tracing::field::Empty,
            )
        })
        .on_response(
            |response: &Response<axum::body::Body>, latency: Duration, span: &Span| {
                span.record("status", response.status().as_u16());
                span.record(
                    "latency_ms",
                    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                );
                DefaultOnResponse::default().on_response(response, latency, span);
            },
        )
}
