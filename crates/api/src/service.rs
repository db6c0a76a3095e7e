//! Document service: the seam between the HTTP surface and the capture
//! pipeline (stores, dispatcher, status router).

use std::sync::Arc;

use snapdoc_core::document::{Document, DocumentStatus};
use snapdoc_core::source::{object_path, validate_owner, validate_source_url};
use snapdoc_core::types::DocumentId;
use snapdoc_db::{DocumentStore, ObjectStore};
use snapdoc_worker::{BoxedTask, DispatchError, DispatcherState, NonBlockingDispatcher, TaskEvents};
use tokio::sync::Mutex;

use crate::capture::CaptureTask;
use crate::config::ServerConfig;
use crate::engine::{PersistRetryPolicy, StatusRouter, StatusRouterHandle};
use crate::error::AppResult;
use crate::ws::WsManager;

/// Builds the task that captures a freshly inserted document.
pub type TaskFactory = Arc<dyn Fn(&Document) -> BoxedTask + Send + Sync>;

pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    ws_manager: Arc<WsManager>,
    dispatcher: NonBlockingDispatcher,
    events: Mutex<Option<TaskEvents>>,
    router: Mutex<Option<StatusRouterHandle>>,
    task_factory: TaskFactory,
    allowed_source_hosts: Vec<String>,
    persist_retry: PersistRetryPolicy,
}

impl DocumentService {
    /// Assemble the service. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        ws_manager: Arc<WsManager>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(config.capture_user_agent.clone())
            .build()?;

        let capture_objects = Arc::clone(&objects);
        let task_factory: TaskFactory = Arc::new(move |document: &Document| {
            Box::new(CaptureTask::new(
                document,
                client.clone(),
                Arc::clone(&capture_objects),
            )) as BoxedTask
        });

        let (dispatcher, events) = NonBlockingDispatcher::new(config.dispatcher.clone());

        Ok(Self {
            store,
            objects,
            ws_manager,
            dispatcher,
            events: Mutex::new(Some(events)),
            router: Mutex::new(None),
            task_factory,
            allowed_source_hosts: config.allowed_source_hosts.clone(),
            persist_retry: config.persist_retry,
        })
    }

    /// Replace the capture task factory.
    pub fn with_task_factory(mut self, factory: TaskFactory) -> Self {
        self.task_factory = factory;
        self
    }

    /// Start the worker pool and the status router.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let mut router = self.router.lock().await;
        self.dispatcher.start().await?;
        let events = self
            .events
            .lock()
            .await
            .take()
            .ok_or(DispatchError::AlreadyStarted)?;

        *router = Some(
            StatusRouter::new(
                Arc::clone(&self.store),
                Arc::clone(&self.ws_manager),
                self.persist_retry,
            )
            .spawn(events),
        );
        tracing::info!("Document service started");
        Ok(())
    }

    /// Stop accepting captures, wait for accepted ones to finish and their
    /// events to be applied, then stop the status router.
    pub async fn stop(&self) -> Result<(), DispatchError> {
        self.dispatcher.stop().await?;
        if let Some(router) = self.router.lock().await.take() {
            router.stop().await;
        }
        tracing::info!("Document service stopped");
        Ok(())
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    pub async fn list_documents(&self, owner: &str) -> AppResult<Vec<Document>> {
        validate_owner(owner)?;
        Ok(self.store.list_documents(owner).await?)
    }

    pub async fn get_document(&self, id: DocumentId) -> AppResult<Document> {
        Ok(self.store.get_document(id).await?)
    }

    /// Validate the request, record a pending document and queue its capture.
    pub async fn generate_document(&self, source_url: &str, owner: &str) -> AppResult<Document> {
        validate_owner(owner)?;
        let url = validate_source_url(source_url, &self.allowed_source_hosts)?;
        match self.dispatcher.state() {
            DispatcherState::Running => {}
            other => return Err(DispatchError::NotRunning(other).into()),
        }

        let document = self.store.insert_document(url.as_str(), owner).await?;
        if let Err(e) = self.dispatcher.dispatch((self.task_factory)(&document)) {
            // Stopped while the record was being inserted.
            self.abandon(&document, &e).await;
            return Err(e.into());
        }

        tracing::info!(document_id = %document.id, owner = %owner, "Capture requested");
        Ok(document)
    }

    /// Mark a document whose capture was refused as failed.
    async fn abandon(&self, document: &Document, refusal: &DispatchError) {
        let message = format!("Failed with error: {refusal}");
        match self
            .store
            .update_status(document.id, DocumentStatus::Error, Some(&message))
            .await
        {
            Ok(_) => tracing::warn!(document_id = %document.id, error = %refusal, "Capture refused"),
            Err(e) => tracing::error!(
                document_id = %document.id,
                error = %e,
                "Failed to mark refused capture"
            ),
        }
    }

    /// Read the captured file of a document.
    pub async fn download_document(&self, id: DocumentId) -> AppResult<(Document, Vec<u8>)> {
        let document = self.store.get_document(id).await?;
        let path = object_path(&document.owner, &document.source_url);
        tracing::info!(document_id = %id, path = %path, "Download document");

        let bytes = self.objects.read(&path).await?;
        Ok((document, bytes))
    }
}
