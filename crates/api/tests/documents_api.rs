//! HTTP tests for the `/api/documents` resource and `/health`.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use snapdoc_core::document::{DocumentStatus, MSG_COMPLETED, MSG_REQUEST_SUBMITTED};
use snapdoc_core::types::DocumentId;
use snapdoc_db::DocumentStore;
use tower::ServiceExt;

use common::{body_bytes, body_json, build_test_app, get, post_json, wait_for_status, STUB_PDF};

// ---------------------------------------------------------------------------
// Test: health reports a running pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_running_dispatcher() {
    let test = build_test_app().await;

    let response = test.app.clone().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["dispatcher"], "running");
    assert_eq!(json["connections"], 0);
}

// ---------------------------------------------------------------------------
// Test: responses carry a request id and CORS headers for allowed origins
// ---------------------------------------------------------------------------

#[tokio::test]
async fn responses_carry_request_id_and_cors_headers() {
    let test = build_test_app().await;
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:8080")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = test.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:8080"
    );
}

// ---------------------------------------------------------------------------
// Test: create returns 202 with the pending record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_202_with_pending_document() {
    let test = build_test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post_json(
            "/api/documents",
            json!({"source_url": "https://docsend.com/view/deck42", "owner": "alice@example.com"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], 0);
    assert_eq!(json["data"]["owner"], "alice@example.com");
    assert_eq!(json["data"]["source_url"], "https://docsend.com/view/deck42");
    assert_eq!(
        json["data"]["status_details"][0]["message"],
        MSG_REQUEST_SUBMITTED
    );
}

// ---------------------------------------------------------------------------
// Test: source URL validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rejects_plain_http_url() {
    let test = build_test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post_json(
            "/api/documents",
            json!({"source_url": "http://docsend.com/view/deck42", "owner": "alice"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(test.store.is_empty().await);
}

#[tokio::test]
async fn create_rejects_host_outside_allow_list() {
    let test = build_test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post_json(
            "/api/documents",
            json!({"source_url": "https://example.org/view/deck42", "owner": "alice"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(test.store.is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: single record lookups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_unknown_or_malformed_id_is_404() {
    let test = build_test_app().await;

    let unknown = format!("/api/documents/{}", DocumentId::now_v7());
    let response = test.app.clone().oneshot(get(&unknown)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = test
        .app
        .clone()
        .oneshot(get("/api/documents/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_returns_stored_document() {
    let test = build_test_app().await;
    let document = test
        .store
        .insert_document("https://docsend.com/view/a", "alice")
        .await
        .unwrap();

    let response = test
        .app
        .clone()
        .oneshot(get(&format!("/api/documents/{}", document.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["id"], document.id.to_string());
}

// ---------------------------------------------------------------------------
// Test: list filters by owner, newest first
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_by_owner_newest_first() {
    let test = build_test_app().await;
    let older = test
        .store
        .insert_document("https://docsend.com/view/1", "alice")
        .await
        .unwrap();
    let newer = test
        .store
        .insert_document("https://docsend.com/view/2", "alice")
        .await
        .unwrap();
    test.store
        .insert_document("https://docsend.com/view/3", "bob")
        .await
        .unwrap();

    let response = test
        .app
        .clone()
        .oneshot(get("/api/documents?owner=alice"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<_> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![newer.id.to_string(), older.id.to_string()]);
}

// ---------------------------------------------------------------------------
// Test: capture runs through the pipeline and the file is downloadable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn captured_document_is_downloadable() {
    let test = build_test_app().await;

    let response = test
        .app
        .clone()
        .oneshot(post_json(
            "/api/documents",
            json!({"source_url": "https://docsend.com/view/deck42", "owner": "alice"}),
        ))
        .await
        .unwrap();
    let json = body_json(response).await;
    let id: DocumentId = json["data"]["id"].as_str().unwrap().parse().unwrap();

    let document = wait_for_status(&test.store, id, DocumentStatus::Complete).await;
    let messages: Vec<_> = document
        .status_details
        .iter()
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(
        messages,
        vec![MSG_COMPLETED, "Stub capture running", MSG_REQUEST_SUBMITTED]
    );

    let response = test
        .app
        .clone()
        .oneshot(get(&format!("/api/documents/{id}/download")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(
        response.headers()["content-disposition"],
        format!("attachment; filename=\"{id}.pdf\"").as_str()
    );
    assert_eq!(body_bytes(response).await, STUB_PDF);
}

#[tokio::test]
async fn download_before_capture_is_404() {
    let test = build_test_app().await;
    let document = test
        .store
        .insert_document("https://docsend.com/view/never", "alice")
        .await
        .unwrap();

    let response = test
        .app
        .clone()
        .oneshot(get(&format!("/api/documents/{}/download", document.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: requests after the pipeline stopped are refused
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_after_stop_is_refused() {
    let test = build_test_app().await;
    test.state.service.stop().await.unwrap();

    let response = test
        .app
        .clone()
        .oneshot(post_json(
            "/api/documents",
            json!({"source_url": "https://docsend.com/view/late", "owner": "alice"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "SERVICE_UNAVAILABLE");
    assert!(test.store.is_empty().await);
}
