//! Transient storage for uploaded images

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

use crate::validation::sanitize_file_name;

/// An uploaded file written to disk for the duration of one request
#[derive(Debug)]
pub struct TransientUpload {
    path: PathBuf,
}

impl TransientUpload {
    /// Write `bytes` under `dir` with a unique name derived from `file_name`
    pub async fn persist(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;

        let path = dir.join(format!(
            "{}-{}",
            Uuid::new_v4(),
            sanitize_file_name(file_name)
        ));

        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Failures are logged, never returned.
    pub async fn remove(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            warn!("Failed to remove upload {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persist_then_remove() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("uploads-test-{}", Uuid::new_v4()));

        let upload = TransientUpload::persist(&dir, "../../bottle.jpg", b"bytes").await?;
        assert!(upload.path().starts_with(&dir));
        assert!(upload.path().to_string_lossy().ends_with("-bottle.jpg"));
        assert_eq!(tokio::fs::read(upload.path()).await?, b"bytes");

        let path = upload.path().to_path_buf();
        upload.remove().await;
        assert!(!path.exists());

        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }

    #[tokio::test]
    async fn same_name_uploads_do_not_collide() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("uploads-test-{}", Uuid::new_v4()));

        let first = TransientUpload::persist(&dir, "photo.png", b"one").await?;
        let second = TransientUpload::persist(&dir, "photo.png", b"two").await?;
        assert_ne!(first.path(), second.path());

        first.remove().await;
        second.remove().await;
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }
}
