//! HTTP route handlers for admin.
//!
//! Every route under `/admin/api` except sign-in and the session probe
//! requires a signed-in admin ([`RequireAdmin`](crate::middleware::RequireAdmin)).
//!
//! # Routes
//!
//! - `POST /admin/api/auth/signin`, `POST /admin/api/auth/signout`,
//!   `GET /admin/api/auth/session`
//! - `GET /admin/api/dashboard`
//! - `GET|POST /admin/api/products`
//! - `GET|PATCH|DELETE /admin/api/products/{product}`
//! - `POST /admin/api/products/{product}/toggle-active`
//! - `POST /admin/api/products/{product}/media` (multipart)
//! - `DELETE /admin/api/products/{product}/media/{media}`
//! - `POST /admin/api/products/{product}/media/{media}/primary`
//! - `GET|POST /admin/api/categories`, `PATCH|DELETE /admin/api/categories/{category}`
//! - `GET /admin/api/orders`, `GET|PATCH /admin/api/orders/{order}`
//! - `GET /admin/api/analytics`

pub mod analytics;
pub mod auth;
pub mod categories;
pub mod dashboard;
pub mod media;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};

use crate::state::AppState;

/// Multipart bodies carry a whole batch of images.
const MEDIA_BODY_LIMIT: usize = 50 * 1024 * 1024;

/// Build the admin API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/api/auth/signin", post(auth::sign_in))
        .route("/admin/api/auth/signout", post(auth::sign_out))
        .route("/admin/api/auth/session", get(auth::session))
        .route("/admin/api/dashboard", get(dashboard::summary))
        .route(
            "/admin/api/products",
            get(products::list).post(products::create),
        )
        .route(
            "/admin/api/products/{product}",
            get(products::show)
                .patch(products::update)
                .delete(products::remove),
        )
        .route(
            "/admin/api/products/{product}/toggle-active",
            post(products::toggle_active),
        )
        .route(
            "/admin/api/products/{product}/media",
            post(media::upload).layer(DefaultBodyLimit::max(MEDIA_BODY_LIMIT)),
        )
        .route(
            "/admin/api/products/{product}/media/{media}",
            delete(media::remove),
        )
        .route(
            "/admin/api/products/{product}/media/{media}/primary",
            post(media::set_primary),
        )
        .route(
            "/admin/api/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/admin/api/categories/{category}",
            patch(categories::update).delete(categories::remove),
        )
        .route("/admin/api/orders", get(orders::list))
        .route(
            "/admin/api/orders/{order}",
            get(orders::show).patch(orders::update),
        )
        .route("/admin/api/analytics", get(analytics::report))
}
