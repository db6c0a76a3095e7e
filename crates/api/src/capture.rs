//! The capture task: fetch a remote document and store it as an object.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use snapdoc_core::document::Document;
use snapdoc_core::source::object_path;
use snapdoc_db::ObjectStore;
use snapdoc_worker::{Task, TaskContext};

pub const MSG_STARTED: &str = "Started capturing document";
pub const MSG_FETCHING: &str = "Fetching document";
pub const MSG_WRITING: &str = "Writing document to object storage";

/// Downloads `source_url` and writes the body to
/// `<owner>/<last path segment>.pdf` in the object store.
///
/// The task id is the document id, which is how the status router finds the
/// record to update.
pub struct CaptureTask {
    id: String,
    source_url: String,
    owner: String,
    client: reqwest::Client,
    objects: Arc<dyn ObjectStore>,
}

impl CaptureTask {
    pub fn new(
        document: &Document,
        client: reqwest::Client,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            id: document.id.to_string(),
            source_url: document.source_url.clone(),
            owner: document.owner.clone(),
            client,
            objects,
        }
    }

    async fn fetch(&self) -> anyhow::Result<Vec<u8>> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .context("Failed to fetch document")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Failed to fetch document: HTTP {}", status.as_u16());
        }

        let body = response
            .bytes()
            .await
            .context("Failed to read document body")?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Task for CaptureTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, ctx: TaskContext) -> anyhow::Result<()> {
        ctx.emit(MSG_STARTED).await;
        ctx.emit(MSG_FETCHING).await;

        let body = tokio::select! {
            body = self.fetch() => body?,
            _ = ctx.cancelled() => anyhow::bail!("Capture cancelled during shutdown"),
        };

        ctx.emit(MSG_WRITING).await;
        let path = object_path(&self.owner, &self.source_url);
        self.objects
            .write(&path, &body)
            .await
            .with_context(|| format!("Failed to write {path}"))?;

        tracing::info!(task_id = %self.id, path = %path, bytes = body.len(), "Document captured");
        Ok(())
    }
}
