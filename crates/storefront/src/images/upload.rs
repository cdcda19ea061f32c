use std::io::Cursor;

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::{info, instrument, warn};

use fernleaf_core::ProductId;

use super::ImageError;
use crate::backend::prelude::*;
use crate::models::{NewMedia, ProductMedia};

/// Largest accepted upload (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Accepted upload MIME types.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Longest side after resizing.
pub const MAX_DIMENSION: u32 = 1200;

/// Quality of the stored JPEG.
pub const JPEG_QUALITY: u8 = 80;

/// One file from an upload batch.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Check every file's type and size. Nothing is uploaded unless all pass.
///
/// # Errors
///
/// Returns the first failing file's `ImageError`, or `NoFiles` for an
/// empty batch.
pub fn validate_batch(files: &[UploadFile]) -> Result<(), ImageError> {
    if files.is_empty() {
        return Err(ImageError::NoFiles);
    }
    for (index, file) in files.iter().enumerate() {
        let content_type = file.content_type.trim().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ImageError::UnsupportedType {
                index,
                content_type: file.content_type.clone(),
            });
        }
        if file.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ImageError::TooLarge {
                index,
                size: file.bytes.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
    }
    Ok(())
}

/// Decode, shrink to fit `MAX_DIMENSION` square (never enlarging) and
/// re-encode as JPEG.
///
/// # Errors
///
/// Returns `ImageError::Decode` for unreadable input and
/// `ImageError::Encode` if the JPEG cannot be written.
pub fn process(bytes: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut img = image::load_from_memory(bytes).map_err(ImageError::Decode)?;

    if img.width() > MAX_DIMENSION || img.height() > MAX_DIMENSION {
        img = img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Lanczos3);
    }

    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
        img.to_rgb8()
            .write_with_encoder(encoder)
            .map_err(ImageError::Encode)?;
    }
    Ok(buffer)
}

/// Object path for the `index`th image of a product.
#[must_use]
pub fn storage_path(product_id: ProductId, index: usize, timestamp_ms: i64) -> String {
    format!("products/{product_id}-{index}-{timestamp_ms}.jpg")
}

/// Validate, process and store a batch of images for a product.
///
/// `existing` is the number of media rows the product already has; new rows
/// continue its sort order and only index 0 is marked primary. If a media
/// row cannot be inserted its object is deleted again. Files stored before
/// a failure are kept.
///
/// # Errors
///
/// Returns `ImageError` for an invalid batch (before any network call) or
/// the first processing, storage or insert failure.
#[instrument(skip(storage, data, files), fields(files = files.len()))]
pub async fn upload_product_images(
    storage: &dyn ObjectStorage,
    data: &dyn DataClient,
    product_id: ProductId,
    files: Vec<UploadFile>,
    existing: usize,
) -> Result<Vec<ProductMedia>, ImageError> {
    validate_batch(&files)?;

    let mut created = Vec::with_capacity(files.len());
    for (offset, file) in files.into_iter().enumerate() {
        let index = existing + offset;
        let jpeg = tokio::task::spawn_blocking(move || process(&file.bytes))
            .await
            .map_err(|_| ImageError::Task)??;

        let path = storage_path(product_id, index, Utc::now().timestamp_millis());
        storage
            .upload(&path, jpeg, "image/jpeg")
            .await
            .map_err(ImageError::Storage)?;

        let media = NewMedia {
            product_id,
            url: storage.public_url(&path),
            storage_path: path.clone(),
            alt_text: None,
            media_type: "image".to_string(),
            sort_order: i32::try_from(index).unwrap_or(i32::MAX),
            is_primary: index == 0,
        };
        match data.insert_media(&media).await {
            Ok(row) => created.push(row),
            Err(e) => {
                if let Err(remove_err) = storage.remove(&path).await {
                    warn!(path = %path, error = %remove_err, "Orphaned image object not removed");
                }
                return Err(ImageError::Backend(e));
            }
        }
    }

    info!(product_id = %product_id, count = created.len(), "Product images uploaded");
    Ok(created)
}
