//! Wishlist handlers. Every route requires a signed-in user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::instrument;

use fernleaf_core::ProductId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::WishlistEntry;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WishlistToggle {
    pub product_id: ProductId,
    pub wishlisted: bool,
}

/// The user's wishlist, joined with products.
#[instrument(skip_all)]
pub async fn list(RequireAuth(user): RequireAuth) -> Result<Json<Vec<WishlistEntry>>> {
    Ok(Json(user.data.list_wishlist(user.id()).await?))
}

/// Add a product. Adding twice is not an error.
#[instrument(skip(state, user))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    ensure_product(&state, product_id).await?;
    user.data.add_to_wishlist(user.id(), product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a product.
#[instrument(skip(user))]
pub async fn remove(
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    if user.data.remove_from_wishlist(user.id(), product_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("wishlist entry {product_id}")))
    }
}

/// Add the product if absent, remove it if present.
#[instrument(skip(state, user))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<WishlistToggle>> {
    let wishlisted = if user.data.is_wishlisted(user.id(), product_id).await? {
        user.data.remove_from_wishlist(user.id(), product_id).await?;
        false
    } else {
        ensure_product(&state, product_id).await?;
        user.data.add_to_wishlist(user.id(), product_id).await?;
        true
    };

    Ok(Json(WishlistToggle {
        product_id,
        wishlisted,
    }))
}

async fn ensure_product(state: &AppState, product_id: ProductId) -> Result<()> {
    state
        .data()
        .get_product(product_id)
        .await?
        .filter(|p| p.is_active)
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))
}
