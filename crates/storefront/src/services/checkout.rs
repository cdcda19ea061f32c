//! Checkout: order totals and order placement.
//!
//! Totals are computed here and stored on the order as-is. The order number
//! is left to the database trigger.
//!
//! No discount codes are offered, so storefront orders carry a zero
//! discount. Anything the request says about money is ignored.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use fernleaf_core::{AnalyticsMetric, OrderStatus, PaymentStatus, Price, UserId};

use crate::backend::BackendError;
use crate::backend::prelude::*;
use crate::cart::CartManager;
use crate::models::{NewOrder, NewOrderItem, Order, ShippingAddress};
use crate::services::outbox::Outbox;

/// Errors that can occur at checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("discount cannot exceed the subtotal")]
    DiscountTooLarge,

    #[error("shipping address is missing: {}", .0.join(", "))]
    IncompleteAddress(Vec<&'static str>),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Tax and shipping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPricing {
    pub tax_rate: Decimal,
    pub shipping_flat: Price,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Option<Price>,
}

impl Default for CheckoutPricing {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(8, 2),
            shipping_flat: Price::from_cents(500).unwrap_or(Price::ZERO),
            free_shipping_threshold: None,
        }
    }
}

/// The money fields stored on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub tax: Price,
    pub shipping: Price,
    pub discount: Price,
    pub total: Price,
}

impl CheckoutPricing {
    /// Totals for a subtotal and discount.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::DiscountTooLarge` if `discount > subtotal`.
    pub fn totals(&self, subtotal: Price, discount: Price) -> Result<OrderTotals, CheckoutError> {
        if discount > subtotal {
            return Err(CheckoutError::DiscountTooLarge);
        }

        let tax = subtotal.apply_rate(self.tax_rate);
        let shipping = match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Price::ZERO,
            _ => self.shipping_flat,
        };
        let total = (subtotal + tax + shipping).saturating_sub(discount);

        Ok(OrderTotals {
            subtotal,
            tax,
            shipping,
            discount,
            total,
        })
    }
}

/// What the customer submits at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Place an order for the cart and empty it.
///
/// Inserts the order, then its items. After success `purchases` is bumped per
/// line by the line quantity and the cart is cleared; both are best-effort.
/// A failure after the order insert leaves the order in place.
///
/// # Errors
///
/// Returns `CheckoutError` for an empty cart, an incomplete address or a
/// failed backend write.
#[instrument(skip(data, outbox, cart, pricing, request), fields(user_id = %user_id))]
pub async fn place_order(
    data: Arc<dyn DataClient>,
    outbox: &Outbox,
    user_id: UserId,
    cart: &mut CartManager,
    pricing: &CheckoutPricing,
    request: CheckoutRequest,
) -> Result<Order, CheckoutError> {
    if cart.state().is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    let missing = request.shipping_address.missing_fields();
    if !missing.is_empty() {
        return Err(CheckoutError::IncompleteAddress(missing));
    }

    let totals = pricing.totals(cart.total_price(), Price::ZERO)?;

    let mut order = data
        .create_order(&NewOrder {
            user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal: totals.subtotal,
            tax_amount: totals.tax,
            shipping_amount: totals.shipping,
            discount_amount: totals.discount,
            total_amount: totals.total,
            shipping_address: Some(request.shipping_address),
            notes: request.notes,
        })
        .await?;

    let lines = &cart.state().items;
    let items: Vec<NewOrderItem> = lines
        .iter()
        .map(|line| NewOrderItem {
            order_id: order.id,
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.name.clone(),
            quantity: i32::try_from(line.quantity).unwrap_or(i32::MAX),
            unit_price: line.price,
            total_price: line.line_total(),
        })
        .collect();
    order.items = data.insert_order_items(&items).await?;

    for line in lines {
        outbox.track(
            Arc::clone(&data),
            line.product_id,
            AnalyticsMetric::Purchases,
            i64::from(line.quantity),
        );
    }
    cart.clear_cart();

    info!(order_number = %order.order_number, total = %order.total_amount, "Order placed");
    Ok(order)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::cart::CartState;

    fn price(cents: i64) -> Price {
        Price::from_cents(cents).unwrap()
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Ada Lovelace".to_string(),
            line1: "12 Fern Row".to_string(),
            line2: None,
            city: "Leeds".to_string(),
            region: None,
            postal_code: "LS1 4AB".to_string(),
            country: "GB".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_totals_subtotal_100() {
        let totals = CheckoutPricing::default()
            .totals(price(10_000), Price::ZERO)
            .unwrap();
        assert_eq!(totals.tax, price(800));
        assert_eq!(totals.shipping, price(500));
        assert_eq!(totals.total, price(11_300));
    }

    #[test]
    fn test_free_shipping_threshold_and_discount() {
        let pricing = CheckoutPricing {
            free_shipping_threshold: Some(price(5_000)),
            ..CheckoutPricing::default()
        };
        let totals = pricing.totals(price(5_000), price(1_000)).unwrap();
        assert_eq!(totals.shipping, Price::ZERO);
        assert_eq!(totals.total, price(4_400));

        assert!(matches!(
            pricing.totals(price(100), price(101)),
            Err(CheckoutError::DiscountTooLarge)
        ));
    }

    #[tokio::test]
    async fn test_place_order_assigns_number_and_clears_cart() {
        let backend = MemoryBackend::new();
        let mug = backend.seed_product("Mug", price(2_500));
        let bowl = backend.seed_product("Bowl", price(5_000));
        let data: Arc<dyn DataClient> = Arc::new(backend.clone());
        let outbox = Outbox::spawn();
        let user = UserId::generate();
        let mut cart = CartManager::new(
            CartState::default(),
            Arc::clone(&data),
            Some(user),
            outbox.clone(),
        );
        cart.add_item(&mug, None, 2);
        cart.add_item(&bowl, None, 1);

        let request = CheckoutRequest {
            shipping_address: address(),
            notes: None,
        };
        let order = place_order(
            Arc::clone(&data),
            &outbox,
            user,
            &mut cart,
            &CheckoutPricing::default(),
            request,
        )
        .await
        .unwrap();
        outbox.flush().await;

        assert_eq!(order.subtotal, price(10_000));
        assert_eq!(order.total_amount, price(11_300));
        assert_eq!(order.items.len(), 2);
        assert!(order.order_number.as_str().starts_with("ORD-"));
        assert!(cart.state().is_empty());
        assert!(backend.cart_item_rows().is_empty());

        let purchases: i64 = backend.analytics_rows().iter().map(|r| r.purchases).sum();
        assert_eq!(purchases, 3);
    }

    #[tokio::test]
    async fn test_request_cannot_lower_the_total() {
        let backend = MemoryBackend::new();
        let mug = backend.seed_product("Mug", price(10_000));
        let data: Arc<dyn DataClient> = Arc::new(backend.clone());
        let outbox = Outbox::spawn();
        let user = UserId::generate();
        let mut cart = CartManager::new(
            CartState::default(),
            Arc::clone(&data),
            Some(user),
            outbox.clone(),
        );
        cart.add_item(&mug, None, 1);

        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "shipping_address": serde_json::to_value(address()).unwrap(),
            "discount": 100,
            "discount_amount": 100,
            "total_amount": 0,
        }))
        .unwrap();
        let order = place_order(
            data,
            &outbox,
            user,
            &mut cart,
            &CheckoutPricing::default(),
            request,
        )
        .await
        .unwrap();

        assert_eq!(order.discount_amount, Price::ZERO);
        assert_eq!(order.total_amount, price(11_300));
    }

    #[tokio::test]
    async fn test_empty_cart_and_bad_address_rejected() {
        let backend = MemoryBackend::new();
        let data: Arc<dyn DataClient> = Arc::new(backend.clone());
        let outbox = Outbox::spawn();
        let user = UserId::generate();
        let mut cart =
            CartManager::new(CartState::default(), Arc::clone(&data), None, outbox.clone());

        let request = CheckoutRequest {
            shipping_address: address(),
            notes: None,
        };
        let err = place_order(
            Arc::clone(&data),
            &outbox,
            user,
            &mut cart,
            &CheckoutPricing::default(),
            request,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        let product = backend.seed_product("Jug", price(900));
        cart.add_item(&product, None, 1);
        outbox.flush().await;
        let calls = backend.call_count();
        let mut bad = address();
        bad.city = String::new();
        let err = place_order(
            data,
            &outbox,
            user,
            &mut cart,
            &CheckoutPricing::default(),
            CheckoutRequest {
                shipping_address: bad,
                    notes: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CheckoutError::IncompleteAddress(ref f) if f == &["city"]));
        assert_eq!(backend.call_count(), calls);
    }
}
