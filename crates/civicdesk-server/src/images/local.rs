//! Filesystem image host.
//!
//! Each upload is written under `root` with a fresh uuid name. The reference
//! id is that file name, so deletion never touches anything outside `root`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use civicdesk_core::image::{ImageError, ImageHost, UploadedImage};

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LocalImageHost {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl LocalImageHost {
    pub fn new(root: impl Into<PathBuf>, public_base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn url_for(&self, name: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{base}/{name}"),
            None => format!("file://{}", self.root.join(name).display()),
        }
    }
}

/// Sniff a file extension from the leading magic bytes.
fn extension_for(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

/// A reference id is a bare file name this host generated.
fn is_valid_reference(reference_id: &str) -> bool {
    !reference_id.is_empty()
        && reference_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        && !reference_id.starts_with('.')
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn upload(&self, bytes: Vec<u8>) -> Result<UploadedImage, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Rejected("image is empty".into()));
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::Rejected(format!(
                "image is {} bytes, limit is {MAX_IMAGE_BYTES}",
                bytes.len()
            )));
        }
        let ext = extension_for(&bytes)
            .ok_or_else(|| ImageError::Rejected("unsupported image format".into()))?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ImageError::Backend(format!("create {}: {e}", self.root.display())))?;

        let name = format!("{}.{ext}", uuid::Uuid::new_v4());
        let path = self.root.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ImageError::Backend(format!("write {}: {e}", path.display())))?;

        info!(reference_id = %name, size = bytes.len(), "Image stored");
        Ok(UploadedImage {
            url: self.url_for(&name),
            reference_id: name,
        })
    }

    async fn delete(&self, reference_id: &str) -> Result<(), ImageError> {
        if !is_valid_reference(reference_id) {
            return Err(ImageError::Rejected(format!(
                "invalid image reference {reference_id:?}"
            )));
        }
        match tokio::fs::remove_file(self.root.join(reference_id)).await {
            Ok(()) => {
                debug!(reference_id, "Image deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ImageError::Backend(format!("delete {reference_id}: {e}"))),
        }
    }
}
