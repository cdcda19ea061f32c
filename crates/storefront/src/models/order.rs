//! Orders and order lines.

use chrono::{DateTime, Utc};
use fernleaf_core::{
    OrderId, OrderItemId, OrderNumber, OrderStatus, PaymentStatus, Price, ProductId, UserId,
    VariantId,
};
use serde::{Deserialize, Serialize};

/// Where an order ships to. Stored as JSON on the order row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ShippingAddress {
    /// Names of required fields that are blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// A placed order with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Price,
    pub tax_amount: Price,
    pub shipping_amount: Price,
    pub discount_amount: Price,
    pub total_amount: Price,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "order_items")]
    pub items: Vec<OrderItem>,
}

/// One line of an order, with the product name copied at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Price,
    pub total_price: Price,
}

/// An order row to insert. The order number is left to the database.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub subtotal: Price,
    pub tax_amount: Price,
    pub shipping_amount: Price,
    pub discount_amount: Price,
    pub total_amount: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An order line to insert.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Price,
    pub total_price: Price,
}

/// Order listing filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl OrderFilter {
    pub const DEFAULT_LIMIT: u32 = 50;

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, 500)
    }

    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

/// Admin changes to an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_deserializes_backend_row() {
        let json = serde_json::json!({
            "id": "2c1f0e4d-3b5a-4c6d-8e7f-9a0b1c2d3e4f",
            "order_number": "ORD-20260301-000007",
            "user_id": "6f1c2a4e-8d9b-4c3a-9e1f-0a2b3c4d5e6f",
            "status": "processing",
            "payment_status": "paid",
            "subtotal": 100,
            "tax_amount": 8,
            "shipping_amount": 5,
            "discount_amount": 0,
            "total_amount": 113,
            "shipping_address": null,
            "created_at": "2026-03-01T10:00:00Z",
            "order_items": []
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.total_amount, Price::from_cents(11_300).unwrap());
        assert_eq!(order.order_number.as_str(), "ORD-20260301-000007");
    }

    #[test]
    fn test_new_order_omits_order_number() {
        let order = NewOrder {
            user_id: UserId::generate(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal: Price::ZERO,
            tax_amount: Price::ZERO,
            shipping_amount: Price::ZERO,
            discount_amount: Price::ZERO,
            total_amount: Price::ZERO,
            shipping_address: None,
            notes: None,
        };
        let value = serde_json::to_value(&order).unwrap();
        assert!(value.get("order_number").is_none());
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn test_missing_address_fields() {
        let address = ShippingAddress {
            full_name: "Ada".to_string(),
            line1: " ".to_string(),
            line2: None,
            city: "Leeds".to_string(),
            region: None,
            postal_code: String::new(),
            country: "GB".to_string(),
            phone: None,
        };
        assert_eq!(address.missing_fields(), vec!["line1", "postal_code"]);
    }
}
