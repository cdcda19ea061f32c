//! Product analytics counters and per-user interaction flags.
//!
//! Every counter change is a single call to the `update_product_analytics`
//! procedure, which upserts today's row for the product. Concurrent
//! increments are resolved by the database. Failures are logged and never
//! reach the visitor.

use std::sync::Arc;

use tracing::{instrument, warn};

use fernleaf_core::{AnalyticsMetric, InteractionType, ProductId, UserId};

use crate::backend::BackendError;
use crate::backend::prelude::*;
use crate::models::InteractionFlags;
use crate::services::outbox::Outbox;

/// Add one to a product's counter for today.
pub async fn track_product_interaction(
    data: &dyn DataClient,
    product_id: ProductId,
    metric: AnalyticsMetric,
) {
    track(data, product_id, metric, 1).await;
}

/// Add `increment` to a product's counter for today. Never fails.
#[instrument(skip(data))]
pub async fn track(
    data: &dyn DataClient,
    product_id: ProductId,
    metric: AnalyticsMetric,
    increment: i64,
) {
    if let Err(e) = data
        .update_product_analytics(product_id, metric, increment)
        .await
    {
        warn!(
            product_id = %product_id,
            metric = %metric,
            error = %e,
            "Analytics increment failed"
        );
    }
}

/// Current like/save/view/share flags for a user and product.
///
/// # Errors
///
/// Returns `BackendError` if the interactions cannot be read.
pub async fn interaction_flags(
    data: &dyn DataClient,
    user_id: UserId,
    product_id: ProductId,
) -> Result<InteractionFlags, BackendError> {
    let types = data.list_interactions(user_id, product_id).await?;
    Ok(InteractionFlags::from_types(&types))
}

/// Flip one interaction flag and return its new value.
///
/// Setting a flag queues an increment of the matching counter. Clearing it
/// never decrements. Views are one-way: toggling a view only ever sets it.
///
/// # Errors
///
/// Returns `BackendError` if the flag cannot be read or written.
#[instrument(skip(data, outbox))]
pub async fn toggle_interaction(
    data: Arc<dyn DataClient>,
    outbox: &Outbox,
    user_id: UserId,
    product_id: ProductId,
    kind: InteractionType,
) -> Result<bool, BackendError> {
    let current = data.list_interactions(user_id, product_id).await?;

    if current.contains(&kind) && kind != InteractionType::View {
        data.remove_interaction(user_id, product_id, kind).await?;
        return Ok(false);
    }

    if data.record_interaction(user_id, product_id, kind).await? {
        outbox.track(data, product_id, kind.metric(), 1);
    }
    Ok(true)
}

/// Record that a signed-in user viewed a product.
///
/// The interaction row is written once per user; the `views` counter is
/// bumped by the caller on every detail view regardless.
pub async fn record_view(data: &dyn DataClient, user_id: UserId, product_id: ProductId) {
    if let Err(e) = data
        .record_interaction(user_id, product_id, InteractionType::View)
        .await
    {
        warn!(
            user_id = %user_id,
            product_id = %product_id,
            error = %e,
            "View interaction not recorded"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use fernleaf_core::Price;

    use super::*;
    use crate::backend::MemoryBackend;

    fn setup() -> (MemoryBackend, Arc<dyn DataClient>, ProductId) {
        let backend = MemoryBackend::new();
        let product = backend.seed_product("Oak Board", Price::from_cents(3900).unwrap());
        let data: Arc<dyn DataClient> = Arc::new(backend.clone());
        (backend, data, product.id)
    }

    #[tokio::test]
    async fn test_two_views_same_day() {
        let (backend, data, product_id) = setup();

        track_product_interaction(data.as_ref(), product_id, AnalyticsMetric::Views).await;
        track_product_interaction(data.as_ref(), product_id, AnalyticsMetric::Views).await;

        let rows = backend.analytics_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].views, 2);
        for metric in AnalyticsMetric::ALL {
            if *metric != AnalyticsMetric::Views {
                assert_eq!(rows[0].get(*metric), 0, "{metric}");
            }
        }
    }

    #[tokio::test]
    async fn test_track_swallows_backend_errors() {
        let (backend, data, product_id) = setup();
        backend.fail("update_product_analytics");
        track(data.as_ref(), product_id, AnalyticsMetric::Shares, 1).await;
        assert!(backend.analytics_rows().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_like_counts_once_and_never_decrements() {
        let (backend, data, product_id) = setup();
        let outbox = Outbox::spawn();
        let user = UserId::generate();

        let like = InteractionType::Like;
        let liked = toggle_interaction(data.clone(), &outbox, user, product_id, like)
            .await
            .unwrap();
        assert!(liked);
        let liked = toggle_interaction(data.clone(), &outbox, user, product_id, like)
            .await
            .unwrap();
        assert!(!liked);
        outbox.flush().await;

        assert_eq!(backend.analytics_rows()[0].likes, 1);
        let flags = interaction_flags(data.as_ref(), user, product_id).await.unwrap();
        assert!(!flags.liked);
    }

    #[tokio::test]
    async fn test_view_toggle_is_one_way() {
        let (_backend, data, product_id) = setup();
        let outbox = Outbox::spawn();
        let user = UserId::generate();

        for _ in 0..2 {
            let viewed =
                toggle_interaction(data.clone(), &outbox, user, product_id, InteractionType::View)
                    .await
                    .unwrap();
            assert!(viewed);
        }
        let flags = interaction_flags(data.as_ref(), user, product_id).await.unwrap();
        assert!(flags.viewed);
    }
}
