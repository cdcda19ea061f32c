//! Server-side cart rows for signed-in shoppers.

use fernleaf_core::{CartId, CartItemId, Price, ProductId, UserId, VariantId};
use serde::{Deserialize, Serialize};

use super::catalog::Product;

/// The single cart row a user owns (`shopping_carts`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCart {
    pub id: CartId,
    pub user_id: UserId,
}

/// A mirrored cart line (`cart_items`), optionally joined with its product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemRow {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    /// Price snapshot taken when the line was added.
    pub unit_price: Price,
    #[serde(default, alias = "products", skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

/// A cart line to insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewCartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub unit_price: Price,
}
