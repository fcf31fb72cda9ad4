//! Image storage backends. Exactly one is active per deployment, chosen by
//! `IMAGE_STORAGE`.

pub mod cloudinary;
pub mod local;

use async_trait::async_trait;
use axum::body::Bytes;
use thiserror::Error;

pub use cloudinary::CloudinaryImageStore;
pub use local::LocalImageStore;

/// URL prefix under which locally stored images are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("image file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("media host request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("media host rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unrecognised image reference: {0}")]
    InvalidReference(String),
}

/// An uploaded file, buffered in memory for the duration of one request.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persists the upload and returns the reference to keep on the event.
    async fn store(&self, upload: ImageUpload) -> Result<String, ImageStoreError>;

    /// Turns a stored reference into a URL a browser can fetch.
    fn resolve(&self, reference: &str, base_url: &str) -> String {
        resolve_reference(reference, base_url)
    }

    async fn delete(&self, reference: &str) -> Result<(), ImageStoreError>;
}

pub fn is_absolute_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Absolute URLs pass through; anything else is treated as a file under
/// [`UPLOADS_ROUTE`] on `base_url`.
pub fn resolve_reference(reference: &str, base_url: &str) -> String {
    if is_absolute_url(reference) {
        return reference.to_string();
    }

    let file_name = reference.rsplit('/').next().unwrap_or(reference);
    format!(
        "{}{}/{}",
        base_url.trim_end_matches('/'),
        UPLOADS_ROUTE,
        file_name
    )
}
