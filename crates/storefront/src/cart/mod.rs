//! Shopping cart.
//!
//! The visitor's cart lives in their HTTP session as a [`CartState`] under
//! [`session_keys::CART`](crate::models::session_keys::CART). For signed-in
//! users every change is also mirrored to the server cart through the
//! outbox; mirror failures never roll back the local cart.

mod manager;
mod mirror;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use fernleaf_core::{Price, ProductId, VariantId};

use crate::models::{CartItemRow, Product, ProductVariant, session_keys};

pub use manager::CartManager;
pub use mirror::{MirrorOp, find_or_create_cart};

/// One line of the local cart. Lines are keyed by product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Local id, `<product_id>-<timestamp_ms>` for lines added here.
    pub id: String,
    pub product_id: ProductId,
    pub name: String,
    /// Unit price snapshotted when the line was added.
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
}

impl CartLine {
    /// A new line for a product, priced from the variant when it has one.
    #[must_use]
    pub fn new(product: &Product, variant: Option<&ProductVariant>, quantity: u32) -> Self {
        Self {
            id: format!("{}-{}", product.id, Utc::now().timestamp_millis()),
            product_id: product.id,
            name: product.name.clone(),
            price: variant.and_then(|v| v.price).unwrap_or(product.price),
            quantity,
            image_url: product.primary_image().map(|m| m.url.clone()),
            variant_id: variant.map(|v| v.id),
        }
    }

    /// Rebuild a line from a server cart row. Rows whose product is gone or
    /// whose quantity is not positive are skipped.
    #[must_use]
    pub fn from_row(row: &CartItemRow) -> Option<Self> {
        let product = row.product.as_ref()?;
        let quantity = u32::try_from(row.quantity).ok().filter(|q| *q > 0)?;
        Some(Self {
            id: row.id.to_string(),
            product_id: row.product_id,
            name: product.name.clone(),
            price: row.unit_price,
            quantity,
            image_url: product.primary_image().map(|m| m.url.clone()),
            variant_id: row.variant_id,
        })
    }

    /// `price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// The visitor's cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartLine>,
}

impl CartState {
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.items.iter().find(|l| l.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Sum of line totals at the snapshotted prices.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartLine::line_total).sum()
    }

    /// Load the cart stored in a session. A missing or unreadable entry is
    /// an empty cart.
    pub async fn load(session: &Session) -> Self {
        match session.get::<Self>(session_keys::CART).await {
            Ok(cart) => cart.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Stored cart unreadable; starting empty");
                Self::default()
            }
        }
    }

    /// Store the cart in a session.
    ///
    /// # Errors
    ///
    /// Returns the session store error if the cart cannot be written.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(session_keys::CART, self).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fernleaf_core::{CartId, CartItemId, Slug};

    use super::*;

    fn product(name: &str, cents: i64) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::generate(),
            name: name.to_string(),
            slug: Slug::from_name(name).unwrap(),
            description: None,
            price: Price::from_cents(cents).unwrap(),
            compare_price: None,
            stock_count: 5,
            is_active: true,
            is_featured: false,
            category_id: None,
            tags: vec![],
            created_at: now,
            updated_at: now,
            media: vec![],
            variants: vec![],
        }
    }

    #[test]
    fn test_line_id_is_product_and_timestamp() {
        let p = product("Tea Towel", 1200);
        let line = CartLine::new(&p, None, 1);
        let prefix = format!("{}-", p.id);
        assert!(line.id.starts_with(&prefix));
        assert!(line.id[prefix.len()..].parse::<i64>().is_ok());
    }

    #[test]
    fn test_variant_price_overrides_product_price() {
        let p = product("Apron", 3000);
        let variant = ProductVariant {
            id: VariantId::generate(),
            product_id: p.id,
            name: "Large".to_string(),
            sku: None,
            price: Some(Price::from_cents(3400).unwrap()),
            stock_count: 2,
            attributes: serde_json::Value::Null,
        };
        let line = CartLine::new(&p, Some(&variant), 1);
        assert_eq!(line.price, Price::from_cents(3400).unwrap());
        assert_eq!(line.variant_id, Some(variant.id));
    }

    #[test]
    fn test_totals() {
        let a = product("A", 1000);
        let b = product("B", 500);
        let cart = CartState {
            items: vec![CartLine::new(&a, None, 2), CartLine::new(&b, None, 1)],
        };
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Price::from_cents(2500).unwrap());
    }

    #[test]
    fn test_from_row_skips_rows_without_product() {
        let row = CartItemRow {
            id: CartItemId::generate(),
            cart_id: CartId::generate(),
            product_id: ProductId::generate(),
            variant_id: None,
            quantity: 2,
            unit_price: Price::from_cents(100).unwrap(),
            product: None,
        };
        assert!(CartLine::from_row(&row).is_none());

        let p = product("Jar", 800);
        let row = CartItemRow {
            product_id: p.id,
            product: Some(p),
            ..row
        };
        let line = CartLine::from_row(&row).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.price, Price::from_cents(100).unwrap());
    }
}
