//! Analytics reports and the dashboard summary.
//!
//! The backend only hands out raw daily rows; every total here is computed
//! in process from those rows, so these functions do no I/O.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use fernleaf_core::{AnalyticsMetric, OrderStatus, PaymentStatus, Price, ProductId};
use fernleaf_storefront::models::{AnalyticsRange, Order, Product, ProductAnalytics};

/// Summed counters for some set of analytics rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricTotals {
    pub views: i64,
    pub likes: i64,
    pub saves: i64,
    pub shares: i64,
    pub cart_adds: i64,
    pub purchases: i64,
}

impl MetricTotals {
    #[must_use]
    pub const fn get(&self, metric: AnalyticsMetric) -> i64 {
        match metric {
            AnalyticsMetric::Views => self.views,
            AnalyticsMetric::Likes => self.likes,
            AnalyticsMetric::Saves => self.saves,
            AnalyticsMetric::Shares => self.shares,
            AnalyticsMetric::CartAdds => self.cart_adds,
            AnalyticsMetric::Purchases => self.purchases,
        }
    }

    fn add_row(&mut self, row: &ProductAnalytics) {
        self.views += row.views;
        self.likes += row.likes;
        self.saves += row.saves;
        self.shares += row.shares;
        self.cart_adds += row.cart_adds;
        self.purchases += row.purchases;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTotals {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub totals: MetricTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: MetricTotals,
}

/// Analytics over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyticsReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub totals: MetricTotals,
    /// Every product with at least one row, busiest (by views) first.
    pub products: Vec<ProductTotals>,
    /// The metric `top` is ranked by.
    pub top_metric: AnalyticsMetric,
    pub top: Vec<ProductTotals>,
    /// One entry per day of the range, zero-filled.
    pub daily: Vec<DailyTotals>,
}

/// Aggregate `rows` over `range`.
///
/// Rows outside the range are ignored. Ties in the rankings are broken by
/// product ID so reports are stable.
#[must_use]
pub fn build_report(
    rows: &[ProductAnalytics],
    range: &AnalyticsRange,
    top_metric: AnalyticsMetric,
    top_n: usize,
) -> AnalyticsReport {
    let mut totals = MetricTotals::default();
    let mut per_product: HashMap<ProductId, MetricTotals> = HashMap::new();
    let mut per_day: HashMap<NaiveDate, MetricTotals> = HashMap::new();

    for row in rows.iter().filter(|row| range.contains(row)) {
        totals.add_row(row);
        per_product.entry(row.product_id).or_default().add_row(row);
        per_day.entry(row.date).or_default().add_row(row);
    }

    let mut products: Vec<ProductTotals> = per_product
        .into_iter()
        .map(|(product_id, totals)| ProductTotals { product_id, totals })
        .collect();

    let top = rank(&products, top_metric, top_n);
    sort_by_metric(&mut products, AnalyticsMetric::Views);

    let daily = days(range.from, range.to)
        .map(|date| DailyTotals {
            date,
            totals: per_day.get(&date).copied().unwrap_or_default(),
        })
        .collect();

    AnalyticsReport {
        from: range.from,
        to: range.to,
        totals,
        products,
        top_metric,
        top,
        daily,
    }
}

fn sort_by_metric(products: &mut [ProductTotals], metric: AnalyticsMetric) {
    products.sort_by(|a, b| {
        b.totals
            .get(metric)
            .cmp(&a.totals.get(metric))
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
}

/// The `n` products with the highest `metric`, skipping those at zero.
fn rank(products: &[ProductTotals], metric: AnalyticsMetric, n: usize) -> Vec<ProductTotals> {
    let mut ranked: Vec<ProductTotals> = products
        .iter()
        .filter(|p| p.totals.get(metric) > 0)
        .cloned()
        .collect();
    sort_by_metric(&mut ranked, metric);
    ranked.truncate(n);
    ranked
}

fn days(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(from), move |day| {
        day.checked_add_days(Days::new(1)).filter(|next| *next <= to)
    })
    .take_while(move |day| *day <= to)
}

/// Product counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProductCounts {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub out_of_stock: usize,
}

/// Order counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderCounts {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub shipped: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl OrderCounts {
    const fn bump(&mut self, status: OrderStatus) {
        self.total += 1;
        let counter = match status {
            OrderStatus::Pending => &mut self.pending,
            OrderStatus::Processing => &mut self.processing,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        };
        *counter += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub products: ProductCounts,
    pub orders: OrderCounts,
    /// Sum of `total_amount` over orders that are neither cancelled nor
    /// refunded.
    pub revenue: Price,
    /// Sum of `total_amount` over paid orders only.
    pub paid_revenue: Price,
}

impl DashboardSummary {
    #[must_use]
    pub fn from_parts(products: &[Product], orders: &[Order]) -> Self {
        let active = products.iter().filter(|p| p.is_active).count();
        let product_counts = ProductCounts {
            total: products.len(),
            active,
            inactive: products.len() - active,
            out_of_stock: products.iter().filter(|p| p.stock_count <= 0).count(),
        };

        let mut order_counts = OrderCounts::default();
        for order in orders {
            order_counts.bump(order.status);
        }

        let counted = |order: &&Order| {
            order.status != OrderStatus::Cancelled
                && order.payment_status != PaymentStatus::Refunded
        };
        let revenue = orders.iter().filter(counted).map(|o| o.total_amount).sum();
        let paid_revenue = orders
            .iter()
            .filter(|o| o.payment_status == PaymentStatus::Paid)
            .map(|o| o.total_amount)
            .sum();

        Self {
            products: product_counts,
            orders: order_counts,
            revenue,
            paid_revenue,
        }
    }
}
