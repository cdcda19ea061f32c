//! Image URL resolution.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use crate::images::ImageState;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub src: String,
    pub width: Option<u32>,
}

/// Resolve an image to a URL that loads: the optimized rendition, the
/// original after retries, or the fallback placeholder. Never fails.
#[instrument(skip(state))]
pub async fn resolve(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Json<ImageState> {
    Json(state.images().resolve(&query.src, query.width).await)
}
