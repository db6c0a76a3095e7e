//! Postgres-backed [`DocumentStore`].
//!
//! History entries live in `document_status_details`; every status update
//! runs in one transaction so the returned document always reflects the
//! committed state.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use snapdoc_core::document::{Document, DocumentStatus, MSG_REQUEST_SUBMITTED};
use snapdoc_core::error::CoreError;
use snapdoc_core::types::{new_document_id, DocumentId};
use sqlx::{PgConnection, PgPool};

use crate::error::classify_sqlx_error;
use crate::models::document::{DocumentRow, StatusDetailRow};
use crate::store::DocumentStore;

/// Column list for `documents` queries.
const COLUMNS: &str = "id, owner, source_url, url, status_id, created_at, updated_at";

/// Column list for `document_status_details` queries.
const DETAIL_COLUMNS: &str = "document_id, message, created_at";

const ENTITY: &str = "Document";

/// Document store over a Postgres pool.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the history of one document, newest first.
    async fn load_details(
        conn: &mut PgConnection,
        id: DocumentId,
    ) -> Result<Vec<StatusDetailRow>, sqlx::Error> {
        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM document_status_details \
             WHERE document_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, StatusDetailRow>(&query)
            .bind(id)
            .fetch_all(conn)
            .await
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_document(&self, source_url: &str, owner: &str) -> Result<Document, CoreError> {
        let id = new_document_id();
        let now = Utc::now();
        let key = id.to_string();
        let map_err = |e: sqlx::Error| classify_sqlx_error(e, ENTITY, &key);

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let query = format!(
            "INSERT INTO documents (id, owner, source_url, status_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&query)
            .bind(id)
            .bind(owner)
            .bind(source_url)
            .bind(DocumentStatus::Pending.id())
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_err)?;

        sqlx::query(
            "INSERT INTO document_status_details (document_id, message, created_at) \
             VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(MSG_REQUEST_SUBMITTED)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;

        let details = Self::load_details(&mut *tx, id).await.map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;

        row.into_document(details)
    }

    async fn update_status(
        &self,
        id: DocumentId,
        status: DocumentStatus,
        message: Option<&str>,
    ) -> Result<Document, CoreError> {
        let now = Utc::now();
        let key = id.to_string();
        let map_err = |e: sqlx::Error| classify_sqlx_error(e, ENTITY, &key);

        let mut tx = self.pool.begin().await.map_err(map_err)?;

        let query = format!(
            "UPDATE documents SET status_id = $2, updated_at = $3 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, DocumentRow>(&query)
            .bind(id)
            .bind(status.id())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_err)?
            .ok_or_else(|| CoreError::document_not_found(id))?;

        if let Some(message) = message.filter(|m| !m.is_empty()) {
            sqlx::query(
                "INSERT INTO document_status_details (document_id, message, created_at) \
                 VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(message)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        }

        let details = Self::load_details(&mut *tx, id).await.map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;

        row.into_document(details)
    }

    async fn get_document(&self, id: DocumentId) -> Result<Document, CoreError> {
        let key = id.to_string();
        let map_err = |e: sqlx::Error| classify_sqlx_error(e, ENTITY, &key);

        let mut conn = self.pool.acquire().await.map_err(map_err)?;

        let query = format!("SELECT {COLUMNS} FROM documents WHERE id = $1");
        let row = sqlx::query_as::<_, DocumentRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_err)?
            .ok_or_else(|| CoreError::document_not_found(id))?;

        let details = Self::load_details(&mut *conn, id).await.map_err(map_err)?;
        row.into_document(details)
    }

    async fn list_documents(&self, owner: &str) -> Result<Vec<Document>, CoreError> {
        let map_err = |e: sqlx::Error| classify_sqlx_error(e, ENTITY, owner);

        let query = format!(
            "SELECT {COLUMNS} FROM documents WHERE owner = $1 ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, DocumentRow>(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DocumentId> = rows.iter().map(|r| r.id).collect();
        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM document_status_details \
             WHERE document_id = ANY($1) \
             ORDER BY created_at DESC, id DESC"
        );
        let details = sqlx::query_as::<_, StatusDetailRow>(&query)
            .bind(&ids[..])
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;

        let mut by_document: HashMap<DocumentId, Vec<StatusDetailRow>> = HashMap::new();
        for detail in details {
            by_document.entry(detail.document_id).or_default().push(detail);
        }

        rows.into_iter()
            .map(|row| {
                let details = by_document.remove(&row.id).unwrap_or_default();
                row.into_document(details)
            })
            .collect()
    }
}
