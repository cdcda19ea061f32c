//! Like, save, view and share flags.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use fernleaf_core::{InteractionType, ProductId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::InteractionFlags;
use crate::services::analytics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ToggleResult {
    pub kind: InteractionType,
    pub active: bool,
    pub flags: InteractionFlags,
}

/// The user's flags for a product.
#[instrument(skip(user))]
pub async fn show(
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<InteractionFlags>> {
    Ok(Json(
        analytics::interaction_flags(user.data.as_ref(), user.id(), product_id).await?,
    ))
}

/// Flip one flag. Setting it bumps the matching daily counter.
#[instrument(skip(state, user))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path((product_id, kind)): Path<(ProductId, String)>,
) -> Result<Json<ToggleResult>> {
    let kind: InteractionType = kind
        .parse()
        .map_err(|e: fernleaf_core::ParseEnumError| AppError::BadRequest(e.to_string()))?;

    state
        .data()
        .get_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    let active = analytics::toggle_interaction(
        user.data.clone(),
        state.outbox(),
        user.id(),
        product_id,
        kind,
    )
    .await?;
    let flags = analytics::interaction_flags(user.data.as_ref(), user.id(), product_id).await?;

    Ok(Json(ToggleResult {
        kind,
        active,
        flags,
    }))
}
