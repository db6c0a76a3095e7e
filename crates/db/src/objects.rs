//! Filesystem-backed [`ObjectStore`].

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use snapdoc_core::error::CoreError;

use crate::store::ObjectStore;

/// Default root directory for stored captures.
pub const DEFAULT_OBJECT_ROOT: &str = "/tmp/snapdoc";

/// Object store that keeps every object as a file below `root`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative object path below the root.
    ///
    /// Absolute paths and `..` components are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf, CoreError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(CoreError::Validation(format!(
                "Object path '{path}' must be relative and stay inside the store"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn exists(&self, path: &str) -> Result<bool, CoreError> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to stat {}: {e}", full.display())))
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<(), CoreError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CoreError::Internal(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&full, data)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to write {}: {e}", full.display())))?;
        tracing::debug!(path = %full.display(), bytes = data.len(), "Object written");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, CoreError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CoreError::NotFound {
                entity: "Object",
                id: path.to_string(),
            }),
            Err(e) => Err(CoreError::Internal(format!(
                "Failed to read {}: {e}",
                full.display()
            ))),
        }
    }
}
