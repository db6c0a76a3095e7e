//! The capture record tracked for every submitted document.
//!
//! A [`Document`] is created in [`DocumentStatus::Pending`] when a capture is
//! requested and afterwards only moves through status transitions driven by
//! the status router. Its history (`status_details`) is append-only and kept
//! newest first.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DocumentId, Timestamp};

/// Status ID type matching SMALLINT in the database and the wire format.
pub type StatusId = i16;

/// Message recorded on a freshly inserted document.
pub const MSG_REQUEST_SUBMITTED: &str = "Request Submitted";

/// Message recorded when a capture task completes.
pub const MSG_COMPLETED: &str = "Completed successfully";

/// Lifecycle status of a capture.
///
/// Serialized as its numeric id (`0..=3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "StatusId", try_from = "StatusId")]
pub enum DocumentStatus {
    Pending = 0,
    Capturing = 1,
    Complete = 2,
    Error = 3,
}

impl DocumentStatus {
    /// Return the numeric status id.
    pub fn id(self) -> StatusId {
        self as StatusId
    }
}

impl From<DocumentStatus> for StatusId {
    fn from(value: DocumentStatus) -> Self {
        value.id()
    }
}

impl TryFrom<StatusId> for DocumentStatus {
    type Error = CoreError;

    fn try_from(value: StatusId) -> Result<Self, CoreError> {
        match value {
            0 => Ok(DocumentStatus::Pending),
            1 => Ok(DocumentStatus::Capturing),
            2 => Ok(DocumentStatus::Complete),
            3 => Ok(DocumentStatus::Error),
            other => Err(CoreError::Validation(format!(
                "Unknown document status id {other}"
            ))),
        }
    }
}

/// One entry of a document's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetail {
    pub message: String,
    pub created: Timestamp,
}

/// A capture record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub status: DocumentStatus,
    /// Status history, newest first.
    pub status_details: Vec<StatusDetail>,
    pub created: Timestamp,
    pub last_updated: Timestamp,
}

impl Document {
    /// Build a new pending document with the initial history entry.
    pub fn new_pending(id: DocumentId, source_url: &str, owner: &str, now: Timestamp) -> Self {
        Self {
            id,
            owner: owner.to_string(),
            source_url: source_url.to_string(),
            url: None,
            status: DocumentStatus::Pending,
            status_details: vec![StatusDetail {
                message: MSG_REQUEST_SUBMITTED.to_string(),
                created: now,
            }],
            created: now,
            last_updated: now,
        }
    }

    /// Apply a status transition in place.
    ///
    /// A non-empty `message` is inserted at the front of the history.
    pub fn apply_status(&mut self, status: DocumentStatus, message: Option<&str>, now: Timestamp) {
        self.status = status;
        self.last_updated = now;
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.status_details.insert(
                0,
                StatusDetail {
                    message: message.to_string(),
                    created: now,
                },
            );
        }
    }

    /// Most recent history message, if any.
    pub fn latest_message(&self) -> Option<&str> {
        self.status_details.first().map(|d| d.message.as_str())
    }
}
