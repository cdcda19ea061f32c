//! Checkout handler.

use axum::{Json, extract::State, http::StatusCode};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::{CartManager, CartState};
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::checkout::{self, CheckoutRequest};
use crate::state::AppState;

/// Place an order for the session cart.
///
/// Responds `201` with the order, including its server-assigned number. The
/// cart is emptied on success.
#[instrument(skip_all, fields(user_id = %user.id()))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let mut cart = CartManager::new(
        CartState::load(&session).await,
        user.data.clone(),
        Some(user.id()),
        state.outbox().clone(),
    );

    let order = checkout::place_order(
        user.data.clone(),
        state.outbox(),
        user.id(),
        &mut cart,
        &state.config().checkout,
        request,
    )
    .await?;

    cart.into_state().save(&session).await?;
    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", order.order_number.as_str())]),
    );

    Ok((StatusCode::CREATED, Json(order)))
}
