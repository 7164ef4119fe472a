//! File store writing photos under a local directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::capture::Photo;
use crate::error::UploadFailure;
use crate::store::traits::FileStore;

/// Stores uploads under `root` and serves them from `base_url`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve `path` under the root, refusing anything that would escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, UploadFailure> {
        let relative = Path::new(path.trim_start_matches('/'));
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.trim().is_empty() || !safe {
            return Err(UploadFailure::Rejected {
                path: path.to_string(),
                reason: "path must be relative and stay inside the store".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn upload(&self, path: &str, photo: &Photo) -> Result<String, UploadFailure> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &photo.bytes).await?;
        tracing::debug!(path, bytes = photo.bytes.len(), "Stored photo");
        Ok(self.public_address(path))
    }

    fn public_address(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}
