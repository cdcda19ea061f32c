//! Account route handlers: profile and order history.

use axum::{
    Json,
    extract::{Path, Query},
};
use serde::Deserialize;
use tracing::instrument;

use fernleaf_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderFilter, ProfileUpdate, UserProfile};

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// The user's own profile.
#[instrument(skip_all)]
pub async fn profile(RequireAuth(user): RequireAuth) -> Result<Json<UserProfile>> {
    user.data
        .get_profile(user.id())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("profile".to_string()))
}

/// Update name, phone or avatar. Unknown fields (including `is_admin`) are
/// rejected by the body extractor.
#[instrument(skip_all)]
pub async fn update_profile(
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>> {
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    Ok(Json(user.data.update_profile(user.id(), &update).await?))
}

/// The user's orders with their items, newest first.
#[instrument(skip(user))]
pub async fn orders(
    RequireAuth(user): RequireAuth,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    let filter = OrderFilter {
        status: query.status,
        user_id: Some(user.id()),
        limit: query.limit,
        offset: query.offset,
    };
    Ok(Json(user.data.list_orders(&filter).await?))
}

/// One of the user's orders.
#[instrument(skip(user))]
pub async fn order(
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    user.data
        .get_order(id)
        .await?
        .filter(|order| order.user_id == Some(user.id()))
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}
