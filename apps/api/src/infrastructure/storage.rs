//! Local disk storage for uploaded images.
//!
//! Files are written under the upload directory with a generated name and
//! served back from `/uploads/<name>`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

pub const PUBLIC_PREFIX: &str = "/uploads";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Only JPEG, PNG, WEBP or GIF images are allowed")]
    UnsupportedType,
    #[error("File is larger than {0} bytes")]
    TooLarge(usize),
    #[error("File is empty")]
    Empty,
    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ImageStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl ImageStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Stores an image and returns its public URL
    pub async fn save_image(
        &self,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let extension = extension_for(content_type).ok_or(StorageError::UnsupportedType)?;
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge(self.max_bytes));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        tracing::debug!(file = %file_name, size = bytes.len(), "Stored upload");
        Ok(format!("{}/{}", PUBLIC_PREFIX, file_name))
    }
}

fn extension_for(content_type: Option<&str>) -> Option<&'static str> {
    match content_type?.split(';').next()?.trim() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(max_bytes: usize) -> ImageStorage {
        ImageStorage::new(
            std::env::temp_dir().join(format!("storage-test-{}", Uuid::new_v4())),
            max_bytes,
        )
    }

    #[tokio::test]
    async fn stores_png_under_public_prefix() {
        let storage = storage(1024);
        let url = storage
            .save_image(Some("image/png"), b"\x89PNG fake")
            .await
            .unwrap();

        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));
        let name = url.trim_start_matches("/uploads/");
        assert!(storage.root().join(name).exists());
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let err = storage(1024)
            .save_image(Some("application/pdf"), b"%PDF")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedType));
    }

    #[tokio::test]
    async fn rejects_missing_content_type() {
        let err = storage(1024).save_image(None, b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedType));
    }

    #[tokio::test]
    async fn rejects_oversized_files() {
        let err = storage(4)
            .save_image(Some("image/jpeg"), b"12345")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge(4)));
    }
}
