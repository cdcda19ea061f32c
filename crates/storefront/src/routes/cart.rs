//! Cart route handlers.
//!
//! The cart lives in the visitor's session. Changes made while signed in are
//! mirrored to the server cart in the background.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use fernleaf_core::{Price, ProductId, VariantId};

use super::visitor_data;
use crate::cart::{CartLine, CartManager, CartState};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{CurrentUser, OptionalAuth};
use crate::state::AppState;

/// Cart contents and totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total_items: u64,
    pub total_price: Price,
}

impl From<CartState> for CartView {
    fn from(cart: CartState) -> Self {
        Self {
            total_items: cart.total_items(),
            total_price: cart.total_price(),
            items: cart.items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i64,
}

/// A manager over the session cart for this visitor.
async fn manager(state: &AppState, user: Option<&CurrentUser>, session: &Session) -> CartManager {
    CartManager::new(
        CartState::load(session).await,
        visitor_data(state, user),
        user.map(CurrentUser::id),
        state.outbox().clone(),
    )
}

async fn save(manager: CartManager, session: &Session) -> Result<Json<CartView>> {
    let cart = manager.into_state();
    cart.save(session).await?;
    Ok(Json(cart.into()))
}

/// Show the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Json<CartView> {
    Json(CartState::load(&session).await.into())
}

/// Add a product to the cart.
#[instrument(skip(state, user, session))]
pub async fn add(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(input): Json<AddToCart>,
) -> Result<Json<CartView>> {
    if input.quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }

    let product = state
        .data()
        .get_product(input.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound(format!("product {}", input.product_id)))?;

    let variant = input
        .variant_id
        .map(|id| {
            product
                .variant(id)
                .ok_or_else(|| AppError::BadRequest("Unknown variant for this product".to_string()))
        })
        .transpose()?;

    let mut cart = manager(&state, user.as_ref(), &session).await;
    cart.add_item(&product, variant, input.quantity);

    let product_id = product.id.to_string();
    add_breadcrumb("cart", "Added to cart", Some(&[("product_id", product_id.as_str())]));

    save(cart, &session).await
}

/// Set a line's quantity. Zero or a negative quantity removes the line.
#[instrument(skip(state, user, session))]
pub async fn update(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(product_id): Path<ProductId>,
    Json(input): Json<UpdateQuantity>,
) -> Result<Json<CartView>> {
    let mut cart = manager(&state, user.as_ref(), &session).await;
    if cart.state().line(product_id).is_none() {
        return Err(AppError::NotFound(format!("cart line {product_id}")));
    }

    cart.update_quantity(product_id, input.quantity);
    save(cart, &session).await
}

/// Remove a product from the cart.
#[instrument(skip(state, user, session))]
pub async fn remove(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let mut cart = manager(&state, user.as_ref(), &session).await;
    cart.remove_item(product_id);
    save(cart, &session).await
}

/// Empty the cart.
#[instrument(skip(state, user, session))]
pub async fn clear(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<Json<CartView>> {
    let mut cart = manager(&state, user.as_ref(), &session).await;
    cart.clear_cart();
    save(cart, &session).await
}
