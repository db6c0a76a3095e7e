//! Storage contracts consumed by the service and the status router.
//!
//! Both traits are object safe so implementations can be selected at
//! startup and shared as `Arc<dyn ...>`.

use async_trait::async_trait;
use snapdoc_core::document::{Document, DocumentStatus};
use snapdoc_core::error::CoreError;
use snapdoc_core::types::DocumentId;

/// Durable record of every capture request.
///
/// Errors are reported as [`CoreError::NotFound`], [`CoreError::DuplicateKey`]
/// or [`CoreError::Internal`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new `Pending` document for `owner`.
    async fn insert_document(&self, source_url: &str, owner: &str) -> Result<Document, CoreError>;

    /// Apply a status transition and return the updated document.
    ///
    /// When `message` is present it becomes the newest history entry.
    async fn update_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        message: Option<&str>,
    ) -> Result<Document, CoreError>;

    async fn get_document(&self, id: DocumentId) -> Result<Document, CoreError>;

    /// All documents of `owner`, newest first.
    async fn list_documents(&self, owner: &str) -> Result<Vec<Document>, CoreError>;
}

/// Blob storage for captured files, addressed by relative path.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, CoreError>;

    /// Write (create or replace) the object at `path`.
    async fn write(&self, path: &str, data: &[u8]) -> Result<(), CoreError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, CoreError>;
}
