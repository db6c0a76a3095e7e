//! Process-local [`DocumentStore`] used by tests and `STORE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use snapdoc_core::document::{Document, DocumentStatus};
use snapdoc_core::error::CoreError;
use snapdoc_core::types::{new_document_id, DocumentId};
use tokio::sync::RwLock;

use crate::store::DocumentStore;

/// In-memory document store.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_document(&self, source_url: &str, owner: &str) -> Result<Document, CoreError> {
        let id = new_document_id();
        let doc = Document::new_pending(id, source_url, owner, Utc::now());

        let mut documents = self.documents.write().await;
        if documents.contains_key(&id) {
            return Err(CoreError::DuplicateKey(format!("Document {id} already exists")));
        }
        documents.insert(id, doc.clone());
        Ok(doc)
    }

    async fn update_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        message: Option<&str>,
    ) -> Result<Document, CoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&id)
            .ok_or_else(|| CoreError::document_not_found(id))?;
        doc.apply_status(status, message, Utc::now());
        Ok(doc.clone())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Document, CoreError> {
        self.documents
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::document_not_found(id))
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<Document>, CoreError> {
        let mut docs: Vec<Document> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.owner == owner)
            .cloned()
            .collect();
        // UUID v7 ids sort by creation time; break timestamp ties with them.
        docs.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.id.cmp(&a.id)));
        Ok(docs)
    }
}
