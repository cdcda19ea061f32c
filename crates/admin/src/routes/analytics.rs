//! Analytics report handler.

use axum::{Json, extract::Query};
use chrono::{Days, NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;

use fernleaf_core::{AnalyticsMetric, ProductId};
use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::error::{AppError, Result};
use fernleaf_storefront::models::AnalyticsRange;

use crate::middleware::RequireAdmin;
use crate::services::reports::{AnalyticsReport, build_report};

const DEFAULT_RANGE_DAYS: u64 = 30;
const MAX_RANGE_DAYS: i64 = 366;
const DEFAULT_TOP: usize = 10;
const MAX_TOP: usize = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<ProductId>,
    /// Metric the top list is ranked by (default `views`).
    pub metric: Option<AnalyticsMetric>,
    pub top: Option<usize>,
}

impl ReportQuery {
    /// The inclusive range asked for; the last 30 days by default.
    fn range(&self, today: NaiveDate) -> Result<AnalyticsRange> {
        let to = self.to.unwrap_or(today);
        let from = match self.from {
            Some(from) => from,
            None => to
                .checked_sub_days(Days::new(DEFAULT_RANGE_DAYS - 1))
                .unwrap_or(to),
        };

        if from > to {
            return Err(AppError::BadRequest(
                "`from` must not be after `to`".to_string(),
            ));
        }
        if (to - from).num_days() >= MAX_RANGE_DAYS {
            return Err(AppError::BadRequest(format!(
                "Date range is limited to {MAX_RANGE_DAYS} days"
            )));
        }

        Ok(AnalyticsRange {
            from,
            to,
            product_id: self.product_id,
        })
    }
}

/// Aggregate the daily product counters over a date range.
#[instrument(skip(admin))]
pub async fn report(
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<ReportQuery>,
) -> Result<Json<AnalyticsReport>> {
    let range = query.range(Utc::now().date_naive())?;
    let rows = admin.data.list_product_analytics(&range).await?;

    Ok(Json(build_report(
        &rows,
        &range,
        query.metric.unwrap_or(AnalyticsMetric::Views),
        query.top.unwrap_or(DEFAULT_TOP).min(MAX_TOP),
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    #[test]
    fn test_default_range_is_thirty_days() {
        let range = ReportQuery::default().range(date(3, 31)).unwrap();
        assert_eq!(range.from, date(3, 2));
        assert_eq!(range.to, date(3, 31));
    }

    #[test]
    fn test_reversed_range_rejected() {
        let query = ReportQuery {
            from: Some(date(3, 5)),
            to: Some(date(3, 1)),
            ..ReportQuery::default()
        };
        assert!(query.range(date(3, 31)).is_err());
    }

    #[test]
    fn test_range_longer_than_a_year_rejected() {
        let query = ReportQuery {
            from: Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            to: Some(date(3, 1)),
            ..ReportQuery::default()
        };
        assert!(query.range(date(3, 31)).is_err());
    }
}
