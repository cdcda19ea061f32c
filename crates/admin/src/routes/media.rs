//! Product media upload and management.

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tracing::{info, instrument, warn};

use fernleaf_core::{MediaId, ProductId};
use fernleaf_storefront::backend::prelude::*;
use fernleaf_storefront::error::{AppError, Result, add_breadcrumb};
use fernleaf_storefront::images::{UploadFile, upload_product_images, validate_batch};
use fernleaf_storefront::models::ProductMedia;

use super::products::load;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Read every file part of a multipart body.
///
/// Parts without a file name (plain form fields) are skipped.
async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Read error: {e}")))?;

        files.push(UploadFile {
            file_name: Some(file_name),
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

/// Upload a batch of images for a product.
///
/// The whole batch is checked before anything is stored; one bad file
/// rejects all of them.
#[instrument(skip(state, admin, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(product_id): Path<ProductId>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ProductMedia>>)> {
    let files = read_files(multipart).await?;
    validate_batch(&files)?;

    let product = load(admin.data.as_ref(), product_id).await?;
    let storage = state.storage().for_user(admin.access_token());

    let count = files.len().to_string();
    add_breadcrumb("media", "Uploading product images", Some(&[("count", count.as_str())]));

    let media = upload_product_images(
        storage.as_ref(),
        admin.data.as_ref(),
        product.id,
        files,
        product.media.len(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(media)))
}

async fn product_media(
    data: &dyn DataClient,
    product_id: ProductId,
    media_id: MediaId,
) -> Result<ProductMedia> {
    data.get_media(media_id)
        .await?
        .filter(|m| m.product_id == product_id)
        .ok_or_else(|| AppError::NotFound(format!("media {media_id}")))
}

/// Delete one media row and its stored object.
#[instrument(skip(state, admin))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path((product_id, media_id)): Path<(ProductId, MediaId)>,
) -> Result<StatusCode> {
    let media = product_media(admin.data.as_ref(), product_id, media_id).await?;

    if let Some(path) = media.storage_path.as_deref() {
        let storage = state.storage().for_user(admin.access_token());
        if let Err(e) = storage.remove(path).await {
            warn!(media_id = %media_id, path, error = %e, "Image object not removed");
        }
    }

    admin.data.delete_media(media_id).await?;
    info!(product_id = %product_id, media_id = %media_id, "Product media deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Make one image the product's primary image.
#[instrument(skip(admin))]
pub async fn set_primary(
    RequireAdmin(admin): RequireAdmin,
    Path((product_id, media_id)): Path<(ProductId, MediaId)>,
) -> Result<StatusCode> {
    product_media(admin.data.as_ref(), product_id, media_id).await?;
    admin.data.set_primary_media(product_id, media_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
