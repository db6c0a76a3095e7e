#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use snapdoc_api::config::{default_user_agent, ServerConfig, StoreBackend};
use snapdoc_api::engine::PersistRetryPolicy;
use snapdoc_api::router::build_app_router;
use snapdoc_api::service::{DocumentService, TaskFactory};
use snapdoc_api::state::AppState;
use snapdoc_api::ws::WsManager;
use snapdoc_core::document::{Document, DocumentStatus};
use snapdoc_core::source::object_path;
use snapdoc_core::types::DocumentId;
use snapdoc_db::{DocumentStore, FsObjectStore, MemoryDocumentStore, ObjectStore};
use snapdoc_worker::{BoxedTask, DispatcherConfig, Task, TaskContext};
use tempfile::TempDir;

/// Body every stub capture writes.
pub const STUB_PDF: &[u8] = b"%PDF-1.4 stub capture";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(object_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8080".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        allowed_source_hosts: vec!["docsend.com".to_string()],
        store_backend: StoreBackend::Memory,
        object_store_root: object_root.to_path_buf(),
        capture_user_agent: default_user_agent(),
        persist_retry: PersistRetryPolicy::default(),
        dispatcher: DispatcherConfig::default().with_workers(2),
    }
}

/// Stand-in for the network capture: reports one step and writes
/// [`STUB_PDF`] where the real capture would.
pub struct StubCapture {
    id: String,
    path: String,
    objects: Arc<dyn ObjectStore>,
}

#[async_trait]
impl Task for StubCapture {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<()> {
        ctx.emit("Stub capture running").await;
        self.objects.write(&self.path, STUB_PDF).await?;
        Ok(())
    }
}

pub fn stub_factory(objects: Arc<dyn ObjectStore>) -> TaskFactory {
    Arc::new(move |document: &Document| {
        Box::new(StubCapture {
            id: document.id.to_string(),
            path: object_path(&document.owner, &document.source_url),
            objects: Arc::clone(&objects),
        }) as BoxedTask
    })
}

/// A started application backed by the memory store and a temp directory.
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryDocumentStore>,
    pub objects: Arc<FsObjectStore>,
    _dir: TempDir,
}

/// Build the full application router with all middleware layers.
pub async fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = Arc::new(MemoryDocumentStore::new());
    let objects = Arc::new(FsObjectStore::new(dir.path()));
    let ws_manager = Arc::new(WsManager::new());

    let service = DocumentService::new(
        &config,
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        Arc::clone(&objects) as Arc<dyn ObjectStore>,
        Arc::clone(&ws_manager),
    )
    .unwrap()
    .with_task_factory(stub_factory(Arc::clone(&objects) as Arc<dyn ObjectStore>));
    service.start().await.unwrap();

    let state = AppState {
        config: Arc::new(config.clone()),
        service: Arc::new(service),
        ws_manager,
    };
    let app = build_app_router(state.clone(), &config);

    TestApp {
        app,
        state,
        store,
        objects,
        _dir: dir,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll the store until the document reaches `status` or two seconds pass.
pub async fn wait_for_status(
    store: &MemoryDocumentStore,
    id: DocumentId,
    status: DocumentStatus,
) -> Document {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let document = store.get_document(id).await.unwrap();
        if document.status == status {
            return document;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "document {id} stuck in {:?}",
            document.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
