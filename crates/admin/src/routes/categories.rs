//! Category management handlers.

use axum::{
    Json,
    extract::{Path, Query},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use fernleaf_core::{CategoryId, Slug};
use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::error::{AppError, Result};
use fernleaf_storefront::models::{Category, CategoryInput};

use crate::middleware::RequireAdmin;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryListQuery {
    /// Include inactive categories (on by default for admins).
    pub include_inactive: Option<bool>,
}

/// Trim the name and normalize the slug. A missing slug is derived from the
/// name when `derive_slug` is set; otherwise it stays unchanged.
fn normalize(mut input: CategoryInput, derive_slug: bool) -> Result<CategoryInput> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    input.name = name.to_string();
    input.slug = match input.slug.take() {
        Some(slug) => Some(
            Slug::from_name(slug.as_str())
                .ok_or_else(|| AppError::BadRequest(format!("Invalid slug: {slug}")))?,
        ),
        None if derive_slug => Some(Slug::from_name_or_id(&input.name, uuid::Uuid::new_v4())),
        None => None,
    };
    Ok(input)
}

#[instrument(skip(admin))]
pub async fn list(
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<Vec<Category>>> {
    let include_inactive = query.include_inactive.unwrap_or(true);
    Ok(Json(admin.data.list_categories(include_inactive).await?))
}

#[instrument(skip_all)]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    Json(input): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = admin.data.create_category(&normalize(input, true)?).await?;
    info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// Replace a category's fields.
#[instrument(skip(admin, input))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let category = admin.data.update_category(id, &normalize(input, false)?).await?;
    info!(category_id = %id, "Category updated");
    Ok(Json(category))
}

/// Delete a category. Its products stay, uncategorized.
#[instrument(skip(admin))]
pub async fn remove(
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    if !admin.data.delete_category(id).await? {
        return Err(AppError::NotFound(format!("category {id}")));
    }
    info!(category_id = %id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str, slug: Option<&str>) -> CategoryInput {
        serde_json::from_value(serde_json::json!({ "name": name, "slug": slug })).unwrap()
    }

    #[test]
    fn test_slug_filled_from_name() {
        let normalized = normalize(input(" Kitchen & Table ", None), true).unwrap();
        assert_eq!(normalized.name, "Kitchen & Table");
        assert_eq!(normalized.slug.unwrap().as_str(), "kitchen-table");
    }

    #[test]
    fn test_given_slug_is_normalized() {
        let normalized = normalize(input("Bath", Some("Bath_Goods")), false).unwrap();
        assert_eq!(normalized.slug.unwrap().as_str(), "bath-goods");
    }

    #[test]
    fn test_update_without_slug_keeps_it() {
        assert!(normalize(input("Bath", None), false).unwrap().slug.is_none());
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(matches!(
            normalize(input(" ", None), true),
            Err(AppError::BadRequest(_))
        ));
    }
}
