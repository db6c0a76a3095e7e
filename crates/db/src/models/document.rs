//! Row models for the `documents` and `document_status_details` tables.

use snapdoc_core::document::{Document, DocumentStatus, StatusDetail, StatusId};
use snapdoc_core::error::CoreError;
use snapdoc_core::types::{DocumentId, Timestamp};
use sqlx::FromRow;

/// A row from the `documents` table.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: DocumentId,
    pub owner: String,
    pub source_url: String,
    pub url: Option<String>,
    pub status_id: StatusId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `document_status_details` table.
#[derive(Debug, Clone, FromRow)]
pub struct StatusDetailRow {
    pub document_id: DocumentId,
    pub message: String,
    pub created_at: Timestamp,
}

impl DocumentRow {
    /// Combine the row with its history (already sorted newest first).
    pub fn into_document(self, details: Vec<StatusDetailRow>) -> Result<Document, CoreError> {
        Ok(Document {
            id: self.id,
            owner: self.owner,
            source_url: self.source_url,
            url: self.url,
            status: DocumentStatus::try_from(self.status_id)?,
            status_details: details
                .into_iter()
                .map(|d| StatusDetail {
                    message: d.message,
                    created: d.created_at,
                })
                .collect(),
            created: self.created_at,
            last_updated: self.updated_at,
        })
    }
}
