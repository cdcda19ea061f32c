//! Product feed, product detail and category handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use fernleaf_core::{AnalyticsMetric, Slug};

use super::visitor_data;
use crate::backend::prelude::*;
use crate::error::{AppError, Result};
use crate::middleware::OptionalAuth;
use crate::models::{Category, InteractionFlags, Product, ProductQuery};
use crate::services::analytics;
use crate::state::AppState;

/// One page of the product feed.
#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub limit: u32,
    pub offset: u32,
}

impl ProductPage {
    #[must_use]
    pub fn new(products: Vec<Product>, query: &ProductQuery) -> Self {
        Self {
            products,
            limit: query.limit(),
            offset: query.offset(),
        }
    }
}

/// Product detail, with the visitor's own flags when signed in.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactions: Option<InteractionFlags>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wishlisted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<u32>,
}

const DEFAULT_RELATED_LIMIT: u32 = 4;
const MAX_RELATED_LIMIT: u32 = 12;

/// List active products.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductPage>> {
    let products = state.data().list_products(&query).await?;
    Ok(Json(ProductPage::new(products, &query)))
}

async fn active_product(data: &dyn DataClient, slug: &Slug) -> Result<Product> {
    data.get_product_by_slug(slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))
}

/// Show one product.
///
/// Every view bumps the product's `views` counter. For a signed-in visitor
/// the view interaction is recorded and their flags are returned.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<Slug>,
) -> Result<Json<ProductDetail>> {
    let data = visitor_data(&state, user.as_ref());
    let product = active_product(data.as_ref(), &slug).await?;

    state
        .outbox()
        .track(Arc::clone(&data), product.id, AnalyticsMetric::Views, 1);

    let (interactions, wishlisted) = match &user {
        Some(user) => {
            analytics::record_view(data.as_ref(), user.id(), product.id).await;
            let flags = analytics::interaction_flags(data.as_ref(), user.id(), product.id)
                .await
                .inspect_err(|e| debug!(error = %e, "Could not read interaction flags"))
                .ok();
            let wishlisted = data
                .is_wishlisted(user.id(), product.id)
                .await
                .inspect_err(|e| debug!(error = %e, "Could not read wishlist"))
                .ok();
            (flags, wishlisted)
        }
        None => (None, None),
    };

    Ok(Json(ProductDetail {
        product,
        interactions,
        wishlisted,
    }))
}

/// Active products from the same category.
#[instrument(skip(state))]
pub async fn related(
    State(state): State<AppState>,
    Path(slug): Path<Slug>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<Product>>> {
    let product = active_product(state.data().as_ref(), &slug).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RELATED_LIMIT)
        .clamp(1, MAX_RELATED_LIMIT);

    let products = state.data().related_products(&product, limit).await?;
    Ok(Json(products))
}

/// Active categories in display order.
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.data().list_categories(false).await?))
}
