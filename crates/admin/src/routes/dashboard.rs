//! Dashboard summary handler.

use axum::Json;
use tracing::instrument;

use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::error::Result;
use fernleaf_storefront::models::{Order, OrderFilter, Product, ProductQuery};

use crate::middleware::RequireAdmin;
use crate::services::reports::DashboardSummary;

/// Every product, active or not, fetched page by page.
async fn all_products(data: &dyn DataClient) -> Result<Vec<Product>> {
    let mut products = Vec::new();
    let mut query = ProductQuery {
        include_inactive: true,
        limit: Some(ProductQuery::MAX_LIMIT),
        offset: Some(0),
        ..ProductQuery::default()
    };
    loop {
        let page = data.list_products(&query).await?;
        let done = page.len() < query.limit() as usize;
        products.extend(page);
        if done {
            return Ok(products);
        }
        query.offset = Some(query.offset() + query.limit());
    }
}

async fn all_orders(data: &dyn DataClient) -> Result<Vec<Order>> {
    let mut orders = Vec::new();
    let mut filter = OrderFilter {
        limit: Some(500),
        offset: Some(0),
        ..OrderFilter::default()
    };
    loop {
        let page = data.list_orders(&filter).await?;
        let done = page.len() < filter.limit() as usize;
        orders.extend(page);
        if done {
            return Ok(orders);
        }
        filter.offset = Some(filter.offset() + filter.limit());
    }
}

/// Product counts, order counts by status and revenue.
#[instrument(skip_all, fields(admin_id = %admin.id()))]
pub async fn summary(RequireAdmin(admin): RequireAdmin) -> Result<Json<DashboardSummary>> {
    let (products, orders) = tokio::try_join!(
        all_products(admin.data.as_ref()),
        all_orders(admin.data.as_ref())
    )?;
    Ok(Json(DashboardSummary::from_parts(&products, &orders)))
}
