use std::sync::Arc;

use tracing::{debug, instrument};

use fernleaf_core::{AnalyticsMetric, Price, ProductId, UserId};

use super::mirror::{MirrorOp, find_or_create_cart};
use super::{CartLine, CartState};
use crate::backend::BackendError;
use crate::backend::prelude::*;
use crate::models::{CartItemRow, Product, ProductVariant};
use crate::services::outbox::{Outbox, SideEffect};

/// Applies cart operations to a [`CartState`] and queues their side effects.
///
/// Built per request from the session cart. `data` is the caller's backend
/// client (user-scoped when signed in); `user_id` is set when the visitor is
/// signed in, which turns on mirroring.
pub struct CartManager {
    state: CartState,
    data: Arc<dyn DataClient>,
    user_id: Option<UserId>,
    outbox: Outbox,
}

impl CartManager {
    #[must_use]
    pub fn new(
        state: CartState,
        data: Arc<dyn DataClient>,
        user_id: Option<UserId>,
        outbox: Outbox,
    ) -> Self {
        Self {
            state,
            data,
            user_id,
            outbox,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> CartState {
        self.state
    }

    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.state.total_items()
    }

    #[must_use]
    pub fn total_price(&self) -> Price {
        self.state.total_price()
    }

    fn mirror(&self, op: MirrorOp) {
        if let Some(user_id) = self.user_id {
            self.outbox.enqueue(SideEffect::MirrorCart {
                data: Arc::clone(&self.data),
                user_id,
                op,
            });
        }
    }

    /// Add `quantity` of a product. A product already in the cart has its
    /// quantity raised instead of gaining a second line.
    pub fn add_item(
        &mut self,
        product: &Product,
        variant: Option<&ProductVariant>,
        quantity: u32,
    ) {
        if let Some(existing) = self.state.line(product.id) {
            let total = i64::from(existing.quantity) + i64::from(quantity);
            self.update_quantity(product.id, total);
            return;
        }

        let line = CartLine::new(product, variant, quantity);
        self.outbox.track(
            Arc::clone(&self.data),
            product.id,
            AnalyticsMetric::CartAdds,
            1,
        );
        self.mirror(MirrorOp::add(&line));
        self.state.items.push(line);
    }

    /// Set a line's quantity. Zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(product_id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let Some(line) = self
            .state
            .items
            .iter_mut()
            .find(|l| l.product_id == product_id)
        else {
            return;
        };
        line.quantity = quantity;
        self.mirror(MirrorOp::SetQuantity {
            product_id,
            quantity,
        });
    }

    pub fn remove_item(&mut self, product_id: ProductId) {
        self.state.items.retain(|l| l.product_id != product_id);
        self.mirror(MirrorOp::Remove { product_id });
    }

    pub fn clear_cart(&mut self) {
        self.state.items.clear();
        self.mirror(MirrorOp::Clear);
    }

    /// Merge the server cart into the local cart after sign-in.
    ///
    /// Lines for products in both carts take the server's quantity and price.
    /// Lines only in the local cart are kept and mirrored up. Server rows that
    /// repeat a product are folded into one line and rewritten as one row.
    /// Does nothing for guests.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the server cart cannot be read; the local
    /// cart is left as it was.
    #[instrument(skip(self), fields(user_id = ?self.user_id))]
    pub async fn load_cart(&mut self) -> Result<(), BackendError> {
        let Some(user_id) = self.user_id else {
            return Ok(());
        };

        let cart = find_or_create_cart(self.data.as_ref(), user_id).await?;
        let rows = self.data.list_cart_items(cart.id).await?;
        let (mut merged, repeated) = lines_from_rows(&rows);

        for product_id in repeated {
            if let Some(line) = merged.iter().find(|l| l.product_id == product_id) {
                self.mirror(MirrorOp::Remove { product_id });
                self.mirror(MirrorOp::add(line));
            }
        }

        let local = std::mem::take(&mut self.state.items);
        for line in local {
            if merged.iter().any(|l| l.product_id == line.product_id) {
                continue;
            }
            self.mirror(MirrorOp::add(&line));
            merged.push(line);
        }

        debug!(lines = merged.len(), "Cart loaded from server");
        self.state.items = merged;
        Ok(())
    }
}

/// One line per product from server rows, plus the products that had more
/// than one row. Repeated rows add their quantities to the first row's line.
fn lines_from_rows(rows: &[CartItemRow]) -> (Vec<CartLine>, Vec<ProductId>) {
    let mut lines: Vec<CartLine> = Vec::with_capacity(rows.len());
    let mut repeated = Vec::new();
    for line in rows.iter().filter_map(CartLine::from_row) {
        match lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                if !repeated.contains(&line.product_id) {
                    repeated.push(line.product_id);
                }
            }
            None => lines.push(line),
        }
    }
    (lines, repeated)
}
