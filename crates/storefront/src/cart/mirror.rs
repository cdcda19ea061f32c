//! Writes that keep a signed-in user's server cart in step with the
//! session cart.

use tracing::instrument;

use fernleaf_core::{Price, ProductId, UserId, VariantId};

use super::CartLine;
use crate::backend::BackendError;
use crate::backend::prelude::*;
use crate::models::{NewCartItem, ServerCart};

/// One change to apply to the server cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOp {
    Add {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        unit_price: Price,
    },
    SetQuantity {
        product_id: ProductId,
        quantity: u32,
    },
    Remove {
        product_id: ProductId,
    },
    Clear,
}

impl MirrorOp {
    /// Write `line` as the server row for its product.
    #[must_use]
    pub const fn add(line: &CartLine) -> Self {
        Self::Add {
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
            unit_price: line.price,
        }
    }

    /// Apply this change to the user's server cart.
    ///
    /// Adds create the cart row on first use and replace any row already
    /// held for the product; the other operations are
    /// no-ops when the user has no server cart yet.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` from the first failing backend call.
    #[instrument(skip(data))]
    pub async fn apply(&self, data: &dyn DataClient, user_id: UserId) -> Result<(), BackendError> {
        match self {
            Self::Add {
                product_id,
                variant_id,
                quantity,
                unit_price,
            } => {
                let cart = find_or_create_cart(data, user_id).await?;
                data.upsert_cart_item(&NewCartItem {
                    cart_id: cart.id,
                    product_id: *product_id,
                    variant_id: *variant_id,
                    quantity: to_column(*quantity),
                    unit_price: *unit_price,
                })
                .await?;
            }
            Self::SetQuantity {
                product_id,
                quantity,
            } => {
                if let Some(cart) = data.find_cart(user_id).await? {
                    data.update_cart_item_quantity(cart.id, *product_id, to_column(*quantity))
                        .await?;
                }
            }
            Self::Remove { product_id } => {
                if let Some(cart) = data.find_cart(user_id).await? {
                    data.delete_cart_item(cart.id, *product_id).await?;
                }
            }
            Self::Clear => {
                if let Some(cart) = data.find_cart(user_id).await? {
                    data.clear_cart_items(cart.id).await?;
                }
            }
        }
        Ok(())
    }
}

/// The user's server cart, created if it does not exist yet.
///
/// # Errors
///
/// Returns `BackendError` if the cart can be neither found nor created.
pub async fn find_or_create_cart(
    data: &dyn DataClient,
    user_id: UserId,
) -> Result<ServerCart, BackendError> {
    if let Some(cart) = data.find_cart(user_id).await? {
        return Ok(cart);
    }
    match data.create_cart(user_id).await {
        Ok(cart) => Ok(cart),
        // Another request created it first.
        Err(BackendError::Conflict(_)) => data
            .find_cart(user_id)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("cart for user {user_id}"))),
        Err(e) => Err(e),
    }
}

fn to_column(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_add_creates_cart_once() {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Candle", Price::from_cents(1600).unwrap());
        let user = UserId::generate();
        let add = MirrorOp::Add {
            product_id: product.id,
            variant_id: None,
            quantity: 1,
            unit_price: product.price,
        };

        add.apply(&backend, user).await.unwrap();
        MirrorOp::SetQuantity {
            product_id: product.id,
            quantity: 4,
        }
        .apply(&backend, user)
        .await
        .unwrap();

        assert_eq!(backend.cart_rows().len(), 1);
        let rows = backend.cart_item_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 4);
        assert_eq!(rows[0].unit_price, product.price);
    }

    #[tokio::test]
    async fn test_remove_without_cart_is_noop() {
        let backend = MemoryBackend::new();
        MirrorOp::Remove {
            product_id: ProductId::generate(),
        }
        .apply(&backend, UserId::generate())
        .await
        .unwrap();
        assert!(backend.cart_rows().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_add_replaces_row() {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Candle", Price::from_cents(1600).unwrap());
        let user = UserId::generate();
        let mut line = CartLine::new(&product, None, 1);

        MirrorOp::add(&line).apply(&backend, user).await.unwrap();
        line.quantity = 2;
        MirrorOp::add(&line).apply(&backend, user).await.unwrap();

        let rows = backend.cart_item_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 2);
    }
}
