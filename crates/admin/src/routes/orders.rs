//! Order management handlers.

use axum::{
    Json,
    extract::{Path, Query},
};
use tracing::{info, instrument};

use fernleaf_core::OrderId;
use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::error::{AppError, Result};
use fernleaf_storefront::models::{Order, OrderFilter, OrderUpdate};

use crate::middleware::RequireAdmin;

/// Orders across all customers, newest first, optionally by status.
#[instrument(skip(admin))]
pub async fn list(
    RequireAdmin(admin): RequireAdmin,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(admin.data.list_orders(&filter).await?))
}

#[instrument(skip(admin))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    admin
        .data
        .get_order(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))
}

/// Check an update against the order's current state.
///
/// Setting the status the order already has is dropped rather than
/// rejected.
fn validate(order: &Order, mut update: OrderUpdate) -> Result<OrderUpdate> {
    if let Some(next) = update.status {
        if next == order.status {
            update.status = None;
        } else if !order.status.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot move order from {} to {next}",
                order.status
            )));
        }
    }

    if update.status.is_none() && update.payment_status.is_none() && update.notes.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }
    Ok(update)
}

/// Update an order's status, payment status or notes.
#[instrument(skip(admin, update))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(update): Json<OrderUpdate>,
) -> Result<Json<Order>> {
    let order = admin
        .data
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;

    let update = validate(&order, update)?;
    let updated = admin.data.update_order(id, &update).await?;
    info!(
        order_number = %updated.order_number,
        status = %updated.status,
        payment_status = %updated.payment_status,
        "Order updated"
    );
    Ok(Json(updated))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use fernleaf_core::{OrderNumber, OrderStatus, PaymentStatus, Price};

    use super::*;

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::generate(),
            order_number: OrderNumber::format(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), 7),
            user_id: None,
            status,
            payment_status: PaymentStatus::Pending,
            subtotal: Price::ZERO,
            tax_amount: Price::ZERO,
            shipping_amount: Price::ZERO,
            discount_amount: Price::ZERO,
            total_amount: Price::ZERO,
            shipping_address: None,
            notes: None,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    fn status(next: OrderStatus) -> OrderUpdate {
        OrderUpdate {
            status: Some(next),
            ..OrderUpdate::default()
        }
    }

    #[test]
    fn test_forward_transition_allowed() {
        let update = validate(&order(OrderStatus::Pending), status(OrderStatus::Processing)).unwrap();
        assert_eq!(update.status, Some(OrderStatus::Processing));
    }

    #[test]
    fn test_terminal_status_cannot_move() {
        let err = validate(&order(OrderStatus::Delivered), status(OrderStatus::Pending)).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_same_status_with_payment_change() {
        let update = OrderUpdate {
            status: Some(OrderStatus::Shipped),
            payment_status: Some(PaymentStatus::Paid),
            notes: None,
        };
        let update = validate(&order(OrderStatus::Shipped), update).unwrap();
        assert_eq!(update.status, None);
        assert_eq!(update.payment_status, Some(PaymentStatus::Paid));
    }

    #[test]
    fn test_empty_update_rejected() {
        let err = validate(&order(OrderStatus::Pending), OrderUpdate::default()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
