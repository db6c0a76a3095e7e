//! Handlers for the `/documents` resource.

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use snapdoc_core::error::CoreError;
use snapdoc_core::source::{CAPTURE_CONTENT_TYPE, CAPTURE_EXTENSION};
use snapdoc_core::types::DocumentId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub source_url: String,
    pub owner: String,
}

/// Unparseable ids are reported like unknown ones.
fn parse_document_id(raw: &str) -> AppResult<DocumentId> {
    raw.parse()
        .map_err(|_| CoreError::document_not_found(raw).into())
}

/// GET /api/documents?owner=<owner>
///
/// The owner's documents, newest first.
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> AppResult<impl IntoResponse> {
    let documents = state.service.list_documents(&query.owner).await?;
    Ok(Json(DataResponse { data: documents }))
}

/// POST /api/documents
///
/// Request a capture. Returns 202 with the pending document; progress is
/// pushed over `/api/status`.
pub async fn create_document(
    State(state): State<AppState>,
    Json(input): Json<CreateDocument>,
) -> AppResult<impl IntoResponse> {
    let document = state
        .service
        .generate_document(&input.source_url, &input.owner)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: document })))
}

/// GET /api/documents/{id}
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    let document = state.service.get_document(id).await?;
    Ok(Json(DataResponse { data: document }))
}

/// GET /api/documents/{id}/download
///
/// The captured file as an attachment named `<id>.pdf`.
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_document_id(&id)?;
    let (document, bytes) = state.service.download_document(id).await?;

    let disposition = format!(
        "attachment; filename=\"{}.{CAPTURE_EXTENSION}\"",
        document.id
    );
    Ok((
        [
            (CONTENT_TYPE, CAPTURE_CONTENT_TYPE.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
