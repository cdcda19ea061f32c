//! Wishlist rows and per-user interaction flags.

use fernleaf_core::{InteractionType, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::catalog::Product;

/// A wishlisted product, optionally joined with the product row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistEntry {
    pub user_id: UserId,
    pub product_id: ProductId,
    #[serde(default, alias = "products", skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

/// Which interaction flags a user has set on a product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFlags {
    pub liked: bool,
    pub saved: bool,
    pub viewed: bool,
    pub shared: bool,
}

impl InteractionFlags {
    /// Build flags from the interaction rows that exist.
    #[must_use]
    pub fn from_types(types: &[InteractionType]) -> Self {
        let mut flags = Self::default();
        for kind in types {
            match kind {
                InteractionType::Like => flags.liked = true,
                InteractionType::Save => flags.saved = true,
                InteractionType::View => flags.viewed = true,
                InteractionType::Share => flags.shared = true,
            }
        }
        flags
    }
}
