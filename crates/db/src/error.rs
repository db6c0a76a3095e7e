use snapdoc_core::error::CoreError;

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Classify a sqlx error into the storage error taxonomy.
///
/// - `RowNotFound` maps to `NotFound` for the given entity/id.
/// - Unique constraint violations map to `DuplicateKey`.
/// - Everything else is `Internal`.
pub fn classify_sqlx_error(err: sqlx::Error, entity: &'static str, id: &str) -> CoreError {
    match err {
        sqlx::Error::RowNotFound => CoreError::NotFound {
            entity,
            id: id.to_string(),
        },
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            CoreError::DuplicateKey(format!("{entity} violates unique constraint {constraint}"))
        }
        other => {
            tracing::error!(error = %other, entity, "Database error");
            CoreError::Internal(other.to_string())
        }
    }
}
