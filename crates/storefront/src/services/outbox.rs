//! Best-effort side effects.
//!
//! Analytics increments and cart mirror writes must never block or fail the
//! request that caused them. They are queued on an unbounded channel and run
//! by a single worker task in enqueue order. Each effect runs at most once;
//! failures are logged at `warn` and dropped.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use fernleaf_core::{AnalyticsMetric, ProductId, UserId};

use crate::backend::DataClient;
use crate::cart::MirrorOp;
use crate::services::analytics;

/// A side effect queued for the worker.
pub enum SideEffect {
    /// Add `increment` to one of today's counters for a product.
    TrackMetric {
        data: Arc<dyn DataClient>,
        product_id: ProductId,
        metric: AnalyticsMetric,
        increment: i64,
    },
    /// Apply a change to a signed-in user's server cart.
    MirrorCart {
        data: Arc<dyn DataClient>,
        user_id: UserId,
        op: MirrorOp,
    },
    /// Resolves once every effect queued before it has run.
    Barrier(oneshot::Sender<()>),
}

impl std::fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrackMetric {
                product_id,
                metric,
                increment,
                ..
            } => f
                .debug_struct("TrackMetric")
                .field("product_id", product_id)
                .field("metric", metric)
                .field("increment", increment)
                .finish(),
            Self::MirrorCart { user_id, op, .. } => f
                .debug_struct("MirrorCart")
                .field("user_id", user_id)
                .field("op", op)
                .finish(),
            Self::Barrier(_) => f.write_str("Barrier"),
        }
    }
}

/// Handle for queueing side effects. Cheap to clone.
///
/// The worker stops once every handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl Outbox {
    /// Start the worker on the current Tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Queue an effect. Never blocks and never fails the caller.
    pub fn enqueue(&self, effect: SideEffect) {
        if let Err(err) = self.tx.send(effect) {
            warn!(effect = ?err.0, "Outbox worker has stopped; side effect dropped");
        }
    }

    /// Queue a daily counter increment.
    pub fn track(
        &self,
        data: Arc<dyn DataClient>,
        product_id: ProductId,
        metric: AnalyticsMetric,
        increment: i64,
    ) {
        self.enqueue(SideEffect::TrackMetric {
            data,
            product_id,
            metric,
            increment,
        });
    }

    /// Wait until everything queued so far has run.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.enqueue(SideEffect::Barrier(tx));
        let _ = rx.await;
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<SideEffect>) {
    while let Some(effect) = rx.recv().await {
        execute(effect).await;
    }
    debug!("Outbox worker stopped");
}

async fn execute(effect: SideEffect) {
    match effect {
        SideEffect::TrackMetric {
            data,
            product_id,
            metric,
            increment,
        } => {
            analytics::track(data.as_ref(), product_id, metric, increment).await;
        }
        SideEffect::MirrorCart { data, user_id, op } => {
            if let Err(e) = op.apply(data.as_ref(), user_id).await {
                warn!(
                    user_id = %user_id,
                    op = ?op,
                    error = %e,
                    "Cart mirror write failed; local cart kept"
                );
            }
        }
        SideEffect::Barrier(done) => {
            let _ = done.send(());
        }
    }
}
