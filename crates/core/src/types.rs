/// Document primary keys are UUID v7 (time ordered).
pub type DocumentId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new document id.
pub fn new_document_id() -> DocumentId {
    uuid::Uuid::now_v7()
}
