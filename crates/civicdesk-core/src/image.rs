//! Image hosting contract.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Error;

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    pub url: String,
    /// Opaque id the host needs to delete the image later.
    pub reference_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image rejected: {0}")]
    Rejected(String),

    #[error("Image host error: {0}")]
    Backend(String),
}

impl From<ImageError> for Error {
    fn from(e: ImageError) -> Self {
        Self::ImageUploadFailed(e.to_string())
    }
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, bytes: Vec<u8>) -> Result<UploadedImage, ImageError>;

    async fn delete(&self, reference_id: &str) -> Result<(), ImageError>;
}
