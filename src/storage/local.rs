//! Filesystem object store, for single-host deployments.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ObjectStore, StoredObject};
use crate::base_image::extension_for_mime;
use crate::error::AppError;

/// Files on disk, published under `{base_url}/{key}.{ext}`.
#[derive(Clone, Debug)]
pub struct LocalStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalStore {
    /// `base_url` is where `base_dir` is mounted, e.g. `https://site/media`.
    pub fn new(base_dir: PathBuf, base_url: &str) -> Self {
        Self {
            base_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve_path(&self, provider_id: &str) -> Result<PathBuf, AppError> {
        let normalized = provider_id.trim_start_matches('/');
        if normalized
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(AppError::Storage(format!(
                "Refusing to resolve storage key {provider_id:?}"
            )));
        }
        Ok(self.base_dir.join(Path::new(normalized)))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<StoredObject, AppError> {
        let provider_id = format!("{}.{}", key.trim_matches('/'), extension_for_mime(mime_type));
        let path = self.resolve_path(&provider_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::Storage(format!("{}: {err}", parent.display())))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|err| AppError::Storage(format!("{}: {err}", path.display())))?;
        Ok(StoredObject {
            url: format!("{}/{}", self.base_url, provider_id),
            provider_id,
        })
    }

    async fn fetch(&self, object: &StoredObject) -> Result<Vec<u8>, AppError> {
        let path = self.resolve_path(&object.provider_id)?;
        fs::read(&path)
            .await
            .map_err(|err| AppError::Storage(format!("{}: {err}", path.display())))
    }

    async fn delete(&self, provider_id: &str) -> Result<(), AppError> {
        let path = self.resolve_path(provider_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Storage(format!("{}: {err}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_fetch_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(dir.path().to_path_buf(), "https://example.org/media/");

        let stored = store
            .put("generations/abc", b"png bytes", "image/png")
            .await
            .expect("put");
        assert_eq!(stored.provider_id, "generations/abc.png");
        assert_eq!(stored.url, "https://example.org/media/generations/abc.png");
        assert!(dir.path().join("generations/abc.png").exists());

        assert_eq!(store.fetch(&stored).await.expect("fetch"), b"png bytes");

        store.delete(&stored.provider_id).await.expect("delete");
        assert!(!dir.path().join("generations/abc.png").exists());
        store
            .delete(&stored.provider_id)
            .await
            .expect("second delete is a no-op");
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::new(dir.path().to_path_buf(), "https://example.org/media");
        assert!(matches!(
            store.delete("../etc/passwd").await,
            Err(AppError::Storage(_))
        ));
    }
}
