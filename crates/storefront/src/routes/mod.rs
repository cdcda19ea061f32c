//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check (in main)
//! GET  /health/ready           - Readiness check against the backend
//!
//! # Catalog
//! GET  /api/products                       - Product feed (filters, sort, paging)
//! GET  /api/products/{slug}                - Product detail (counts a view)
//! GET  /api/products/{slug}/related        - Same-category products
//! GET  /api/categories                     - Active categories
//! GET  /api/search?q=                      - Search by name and description
//!
//! # Cart (session backed, mirrored when signed in)
//! GET    /api/cart                         - Current cart
//! POST   /api/cart/items                   - Add a product
//! PATCH  /api/cart/items/{product_id}      - Set a quantity (<= 0 removes)
//! DELETE /api/cart/items/{product_id}      - Remove a product
//! DELETE /api/cart                         - Empty the cart
//!
//! # Auth
//! POST /api/auth/signup        - Create an account
//! POST /api/auth/signin        - Password sign-in
//! POST /api/auth/signout       - Sign out
//! GET  /api/auth/session       - Current user and admin flag
//!
//! # Wishlist and interactions (requires auth)
//! GET    /api/wishlist                              - Wishlist with products
//! POST   /api/wishlist/{product_id}                 - Add
//! DELETE /api/wishlist/{product_id}                 - Remove
//! POST   /api/wishlist/{product_id}/toggle          - Toggle
//! GET    /api/products/{product_id}/interactions         - Like/save/view/share flags
//! POST   /api/products/{product_id}/interactions/{kind}  - Toggle a flag
//!
//! # Account (requires auth)
//! GET   /api/account/profile       - Own profile
//! PATCH /api/account/profile       - Update name, phone, avatar
//! GET   /api/account/orders        - Own orders
//! GET   /api/account/orders/{id}   - One order
//! POST  /api/checkout              - Place an order from the cart
//!
//! # Images
//! GET  /api/images/resolve?src=&width=     - Displayable URL with fallback
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod images;
pub mod interactions;
pub mod products;
pub mod search;
pub mod wishlist;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::backend::DataClient;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// The backend client to use for a visitor: scoped to the user when signed
/// in, anonymous otherwise.
fn visitor_data(state: &AppState, user: Option<&CurrentUser>) -> Arc<dyn DataClient> {
    user.map_or_else(|| Arc::clone(state.data()), |u| Arc::clone(&u.data))
}

/// Build the storefront API router.
///
/// Product routes share one path parameter name (`{product}`): a slug for
/// the catalog routes, an ID for the interaction routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/api/products", get(products::list))
        .route("/api/products/{product}", get(products::show))
        .route("/api/products/{product}/related", get(products::related))
        .route("/api/categories", get(products::categories))
        .route("/api/search", get(search::search))
        // Cart
        .route("/api/cart", get(cart::show).delete(cart::clear))
        .route("/api/cart/items", post(cart::add))
        .route(
            "/api/cart/items/{product_id}",
            patch(cart::update).delete(cart::remove),
        )
        // Auth
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/signin", post(auth::sign_in))
        .route("/api/auth/signout", post(auth::sign_out))
        .route("/api/auth/session", get(auth::session))
        // Wishlist
        .route("/api/wishlist", get(wishlist::list))
        .route(
            "/api/wishlist/{product_id}",
            post(wishlist::add).delete(wishlist::remove),
        )
        .route("/api/wishlist/{product_id}/toggle", post(wishlist::toggle))
        // Interactions
        .route(
            "/api/products/{product}/interactions",
            get(interactions::show),
        )
        .route(
            "/api/products/{product}/interactions/{kind}",
            post(interactions::toggle),
        )
        // Account
        .route(
            "/api/account/profile",
            get(account::profile).patch(account::update_profile),
        )
        .route("/api/account/orders", get(account::orders))
        .route("/api/account/orders/{id}", get(account::order))
        .route("/api/checkout", post(checkout::place_order))
        // Images
        .route("/api/images/resolve", get(images::resolve))
}
