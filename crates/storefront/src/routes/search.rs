//! Product search.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use tracing::instrument;

use super::products::ProductPage;
use crate::error::Result;
use crate::models::ProductQuery;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Search active products by name and description.
///
/// A blank query returns an empty page without calling the backend.
#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<ProductPage>> {
    let query = ProductQuery {
        search: Some(params.q),
        limit: params.limit,
        offset: params.offset,
        ..ProductQuery::default()
    };

    if query.search_term().is_none() {
        return Ok(Json(ProductPage::new(Vec::new(), &query)));
    }

    let products = state.data().list_products(&query).await?;
    Ok(Json(ProductPage::new(products, &query)))
}
