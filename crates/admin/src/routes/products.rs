//! Product management handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use fernleaf_core::{CategoryId, Price, ProductId, Slug};
use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::error::{AppError, Result};
use fernleaf_storefront::models::{NewProduct, Product, ProductQuery, ProductUpdate};
use fernleaf_storefront::routes::products::ProductPage;

use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// New product as submitted by the dashboard.
///
/// Prices arrive as plain decimals so a negative amount is reported as a
/// validation error rather than a malformed body.
#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub compare_price: Option<Decimal>,
    #[serde(default)]
    pub stock_count: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub tags: Vec<String>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub compare_price: Option<Decimal>,
    pub stock_count: Option<i32>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub category_id: Option<CategoryId>,
    pub tags: Option<Vec<String>>,
}

fn price(field: &str, amount: Decimal) -> Result<Price> {
    Price::new(amount).map_err(|e| AppError::BadRequest(format!("{field}: {e}")))
}

fn name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    Ok(trimmed.to_string())
}

fn stock(count: i32) -> Result<i32> {
    if count < 0 {
        return Err(AppError::BadRequest(
            "Stock count cannot be negative".to_string(),
        ));
    }
    Ok(count)
}

/// Normalize a slug the admin typed; it must keep at least one character.
pub(crate) fn explicit_slug(raw: &str) -> Result<Slug> {
    Slug::from_name(raw).ok_or_else(|| AppError::BadRequest(format!("Invalid slug: {raw:?}")))
}

impl CreateProduct {
    /// Validate and fill in the slug.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for a blank name, a negative price or
    /// stock count, or a slug with no usable characters.
    pub fn into_new_product(self) -> Result<NewProduct> {
        let name = name(&self.name)?;
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => explicit_slug(raw)?,
            _ => Slug::from_name_or_id(&name, uuid::Uuid::new_v4()),
        };

        Ok(NewProduct {
            slug,
            name,
            description: self.description,
            price: price("price", self.price)?,
            compare_price: self
                .compare_price
                .map(|p| price("compare_price", p))
                .transpose()?,
            stock_count: stock(self.stock_count)?,
            is_active: self.is_active,
            is_featured: self.is_featured,
            category_id: self.category_id,
            tags: self.tags,
        })
    }
}

impl UpdateProduct {
    /// Validate the set fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an invalid field or an update that
    /// sets nothing.
    pub fn into_update(self) -> Result<ProductUpdate> {
        let update = ProductUpdate {
            name: self.name.as_deref().map(name).transpose()?,
            slug: self.slug.as_deref().map(explicit_slug).transpose()?,
            description: self.description,
            price: self.price.map(|p| price("price", p)).transpose()?,
            compare_price: self
                .compare_price
                .map(|p| price("compare_price", p))
                .transpose()?,
            stock_count: self.stock_count.map(stock).transpose()?,
            is_active: self.is_active,
            is_featured: self.is_featured,
            category_id: self.category_id,
            tags: self.tags,
        };

        let empty = update.name.is_none()
            && update.slug.is_none()
            && update.description.is_none()
            && update.price.is_none()
            && update.compare_price.is_none()
            && update.stock_count.is_none()
            && update.is_active.is_none()
            && update.is_featured.is_none()
            && update.category_id.is_none()
            && update.tags.is_none();
        if empty {
            return Err(AppError::BadRequest("Nothing to update".to_string()));
        }
        Ok(update)
    }
}

pub(crate) async fn load(data: &dyn DataClient, id: ProductId) -> Result<Product> {
    data.get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// List products, inactive ones included.
#[instrument(skip(admin))]
pub async fn list(
    RequireAdmin(admin): RequireAdmin,
    Query(mut query): Query<ProductQuery>,
) -> Result<Json<ProductPage>> {
    query.include_inactive = true;
    let products = admin.data.list_products(&query).await?;
    Ok(Json(ProductPage::new(products, &query)))
}

#[instrument(skip(admin))]
pub async fn show(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    Ok(Json(load(admin.data.as_ref(), id).await?))
}

#[instrument(skip_all, fields(admin_id = %admin.id()))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CreateProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = admin.data.create_product(&input.into_new_product()?).await?;
    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(admin, input))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(input): Json<UpdateProduct>,
) -> Result<Json<Product>> {
    let product = admin.data.update_product(id, &input.into_update()?).await?;
    info!(product_id = %id, "Product updated");
    Ok(Json(product))
}

/// Flip `is_active`.
#[instrument(skip(admin))]
pub async fn toggle_active(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let current = load(admin.data.as_ref(), id).await?;
    let update = ProductUpdate {
        is_active: Some(!current.is_active),
        ..ProductUpdate::default()
    };
    let product = admin.data.update_product(id, &update).await?;
    info!(product_id = %id, is_active = product.is_active, "Product visibility changed");
    Ok(Json(product))
}

/// Delete a product. Its media rows go with it; stored image objects are
/// removed first, best effort.
#[instrument(skip(state, admin))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    let product = load(admin.data.as_ref(), id).await?;
    let storage = state.storage().for_user(admin.access_token());
    for path in product.media.iter().filter_map(|m| m.storage_path.as_deref()) {
        if let Err(e) = storage.remove(path).await {
            warn!(product_id = %id, path, error = %e, "Image object not removed");
        }
    }

    if !admin.data.delete_product(id).await? {
        return Err(AppError::NotFound(format!("product {id}")));
    }
    info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn create(json: serde_json::Value) -> CreateProduct {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_slug_derived_from_name() {
        let product = create(serde_json::json!({ "name": "Linen Apron!", "price": "24.00" }))
            .into_new_product()
            .unwrap();
        assert_eq!(product.slug.as_str(), "linen-apron");
        assert!(product.is_active);
    }

    #[test]
    fn test_unusable_name_falls_back_to_id_slug() {
        let product = create(serde_json::json!({ "name": "***", "price": 1 }))
            .into_new_product()
            .unwrap();
        assert!(product.slug.as_str().starts_with("item-"));
    }

    #[test]
    fn test_negative_price_rejected() {
        let err = create(serde_json::json!({ "name": "Mug", "price": "-1.00" }))
            .into_new_product()
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = create(serde_json::json!({ "name": "  ", "price": "3.00" }))
            .into_new_product()
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_empty_update_rejected() {
        let err = UpdateProduct::default().into_update().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn test_update_normalizes_slug() {
        let update = UpdateProduct {
            slug: Some("Summer Sale".to_string()),
            ..UpdateProduct::default()
        }
        .into_update()
        .unwrap();
        assert_eq!(update.slug.unwrap().as_str(), "summer-sale");
    }
}
