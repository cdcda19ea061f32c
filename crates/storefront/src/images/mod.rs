//! Product image pipeline.
//!
//! - `upload` - Validate, resize, re-encode and store admin uploads
//! - `render` - Resolve a displayable URL with retry and fallback
//! - `cache` - Bounded cache of optimized URLs

mod cache;
mod render;
mod upload;

use thiserror::Error;

use crate::backend::BackendError;

pub use cache::OptimizedUrlCache;
pub use render::{HttpProbe, ImageLoad, ImageProbe, ImageResolver, ImageState, RetryPolicy};
pub use upload::{
    ALLOWED_CONTENT_TYPES, JPEG_QUALITY, MAX_DIMENSION, MAX_UPLOAD_BYTES, UploadFile, process,
    storage_path, upload_product_images, validate_batch,
};

/// Errors that can occur while handling product images.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("no files uploaded")]
    NoFiles,

    #[error("file {index}: unsupported type {content_type} (allowed: jpeg, png, webp)")]
    UnsupportedType { index: usize, content_type: String },

    #[error("file {index}: {size} bytes exceeds the {max} byte limit")]
    TooLarge {
        index: usize,
        size: usize,
        max: usize,
    },

    #[error("could not decode image: {0}")]
    Decode(image::ImageError),

    #[error("could not encode image: {0}")]
    Encode(image::ImageError),

    #[error("image processing task failed")]
    Task,

    #[error("storage error: {0}")]
    Storage(BackendError),

    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl ImageError {
    /// Whether the upload itself was at fault (a 400 rather than a 5xx).
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::NoFiles | Self::UnsupportedType { .. } | Self::TooLarge { .. } | Self::Decode(_)
        )
    }
}
