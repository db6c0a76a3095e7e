#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing document.
    pub fn document_not_found(id: impl ToString) -> Self {
        CoreError::NotFound {
            entity: "Document",
            id: id.to_string(),
        }
    }

    /// Whether retrying the failed operation could succeed.
    ///
    /// Only internal (storage/transport) failures are transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Internal(_))
    }
}
