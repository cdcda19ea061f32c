//! Daily product counters (`product_analytics`).

use chrono::NaiveDate;
use fernleaf_core::{AnalyticsMetric, ProductId};
use serde::{Deserialize, Serialize};

/// One product's counters for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAnalytics {
    pub product_id: ProductId,
    pub date: NaiveDate,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub saves: i64,
    #[serde(default)]
    pub shares: i64,
    #[serde(default)]
    pub cart_adds: i64,
    #[serde(default)]
    pub purchases: i64,
}

impl ProductAnalytics {
    /// A row with every counter at zero.
    #[must_use]
    pub const fn empty(product_id: ProductId, date: NaiveDate) -> Self {
        Self {
            product_id,
            date,
            views: 0,
            likes: 0,
            saves: 0,
            shares: 0,
            cart_adds: 0,
            purchases: 0,
        }
    }

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

    /// Add to one counter, leaving the others alone.
    pub const fn add(&mut self, metric: AnalyticsMetric, increment: i64) {
        let counter = match metric {
            AnalyticsMetric::Views => &mut self.views,
            AnalyticsMetric::Likes => &mut self.likes,
            AnalyticsMetric::Saves => &mut self.saves,
            AnalyticsMetric::Shares => &mut self.shares,
            AnalyticsMetric::CartAdds => &mut self.cart_adds,
            AnalyticsMetric::Purchases => &mut self.purchases,
        };
        *counter += increment;
    }
}

/// Inclusive date range for analytics reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(default)]
    pub product_id: Option<ProductId>,
}

impl AnalyticsRange {
    #[must_use]
    pub fn contains(&self, row: &ProductAnalytics) -> bool {
        row.date >= self.from
            && row.date <= self.to
            && self.product_id.is_none_or(|id| id == row.product_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_touches_one_counter() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut row = ProductAnalytics::empty(ProductId::generate(), date);
        row.add(AnalyticsMetric::CartAdds, 2);
        assert_eq!(row.get(AnalyticsMetric::CartAdds), 2);
        for metric in AnalyticsMetric::ALL {
            if *metric != AnalyticsMetric::CartAdds {
                assert_eq!(row.get(*metric), 0);
            }
        }
    }
}
