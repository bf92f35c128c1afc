//! Request orchestration: validate, edit, publish, clean up.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use psdtext_api_types::FailedLayer;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::processor::process_text_updates;
use crate::domain::documents::PsdId;
use crate::domain::updates::ProcessReport;
use crate::infra::documents::{DocumentDirectory, PendingArtifact};
use crate::infra::editor::{EditorBridge, EditorError};
use crate::infra::storage::{ObjectStore, StorageError};
use crate::infra::telemetry::{METRIC_UPLOAD_BYTES, METRIC_UPLOADS_TOTAL};

pub const RENDER_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum PsdTextError {
    #[error("PSD file not found")]
    DocumentNotFound,
    #[error("No layers were updated")]
    NoLayersUpdated { failed_layers: Vec<FailedLayer> },
    #[error("failed to inspect document directory: {0}")]
    Directory(#[source] std::io::Error),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("editor worker failed: {0}")]
    Worker(String),
    #[error("failed to handle render file: {0}")]
    Artifact(#[source] std::io::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A render that was uploaded and removed from local disk.
#[derive(Debug, Clone)]
pub struct PublishedRender {
    pub updated_layers: Vec<String>,
    pub failed_layers: Vec<FailedLayer>,
    pub object_key: String,
    pub public_url: String,
}

pub struct PsdTextService {
    documents: DocumentDirectory,
    editor: Arc<dyn EditorBridge>,
    storage: Arc<dyn ObjectStore>,
    key_prefix: String,
    // The editor is a single application instance; sessions must not interleave.
    editor_lane: Mutex<()>,
}

impl PsdTextService {
    pub fn new(
        documents: DocumentDirectory,
        editor: Arc<dyn EditorBridge>,
        storage: Arc<dyn ObjectStore>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            editor,
            storage,
            key_prefix: key_prefix.into().trim_matches('/').to_string(),
            editor_lane: Mutex::new(()),
        }
    }

    /// Object key under which the render of `id` is published.
    pub fn object_key(&self, id: &PsdId) -> String {
        if self.key_prefix.is_empty() {
            id.artifact_file_name()
        } else {
            format!("{}/{}", self.key_prefix, id.artifact_file_name())
        }
    }

    /// Rewrite text layers of `<id>.psd`, export, upload and delete the render.
    ///
    /// The object store is only contacted when at least one layer changed, and
    /// the local render never survives the call.
    pub async fn update_text(
        &self,
        id: &PsdId,
        updates: Vec<Value>,
    ) -> Result<PublishedRender, PsdTextError> {
        let started_at = Instant::now();
        if !self
            .documents
            .source_exists(id)
            .await
            .map_err(PsdTextError::Directory)?
        {
            return Err(PsdTextError::DocumentNotFound);
        }

        let artifact = PendingArtifact::new(self.documents.artifact_path(id));
        let report = self
            .process(self.documents.source_path(id), artifact.path().to_path_buf(), updates)
            .await?;
        if !report.any_updated() {
            return Err(PsdTextError::NoLayersUpdated {
                failed_layers: report.failed_layers,
            });
        }

        let object_key = self.object_key(id);
        let body = artifact.read().await.map_err(PsdTextError::Artifact)?;
        let size = body.len();
        if let Err(err) = self
            .storage
            .put_object(&object_key, body, RENDER_CONTENT_TYPE)
            .await
        {
            counter!(METRIC_UPLOADS_TOTAL, "result" => "error").increment(1);
            warn!(
                target = "application::psd_text",
                op = "psd_text::upload",
                result = "error",
                psd_id = %id,
                key = %object_key,
                error = %err,
                "Render upload failed"
            );
            return Err(err.into());
        }
        counter!(METRIC_UPLOADS_TOTAL, "result" => "ok").increment(1);
        histogram!(METRIC_UPLOAD_BYTES).record(size as f64);

        let public_url = self.storage.public_url(&object_key);
        artifact.remove().await.map_err(PsdTextError::Artifact)?;

        info!(
            target = "application::psd_text",
            op = "psd_text::update_text",
            result = "published",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            psd_id = %id,
            key = %object_key,
            bytes = size,
            updated = report.updated_layers.len(),
            failed = report.failed_layers.len(),
            "Render published"
        );

        Ok(PublishedRender {
            updated_layers: report.updated_layers,
            failed_layers: report.failed_layers,
            object_key,
            public_url,
        })
    }

    async fn process(
        &self,
        source: PathBuf,
        output: PathBuf,
        updates: Vec<Value>,
    ) -> Result<ProcessReport, PsdTextError> {
        let _lane = self.editor_lane.lock().await;
        let editor = Arc::clone(&self.editor);
        let report = tokio::task::spawn_blocking(move || {
            process_text_updates(editor.as_ref(), &source, &output, &updates)
        })
        .await
        .map_err(|err| PsdTextError::Worker(err.to_string()))??;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::editor::{EditorDocument, InMemoryEditor, LayerKind};
    use crate::infra::storage::InMemoryObjectStore;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Editor whose sessions take a while and record how many run at once.
    #[derive(Default)]
    struct SlowEditor {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    struct SlowDocument {
        active: Arc<AtomicUsize>,
    }

    impl EditorBridge for SlowEditor {
        fn open(&self, _path: &Path) -> Result<Box<dyn EditorDocument>, EditorError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            Ok(Box::new(SlowDocument {
                active: Arc::clone(&self.active),
            }))
        }
    }

    impl EditorDocument for SlowDocument {
        fn layer_kind(&mut self, _name: &str) -> Result<LayerKind, EditorError> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(LayerKind::Text)
        }

        fn set_text(&mut self, _name: &str, _text: &str) -> Result<(), EditorError> {
            Ok(())
        }

        fn export_jpeg(&mut self, output: &Path, _quality: u8) -> Result<(), EditorError> {
            std::fs::write(output, [0xFF, 0xD8, 0xFF, 0xD9])?;
            Ok(())
        }

        fn close(&mut self) -> Result<(), EditorError> {
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn service(prefix: &str) -> PsdTextService {
        PsdTextService::new(
            DocumentDirectory::new(PathBuf::from("/srv/psd")),
            Arc::new(InMemoryEditor::new()),
            Arc::new(InMemoryObjectStore::new("https://bucket.example")),
            prefix,
        )
    }

    #[test]
    fn object_keys_join_prefix_and_artifact_name() {
        let id = PsdId::parse("7").expect("id");
        assert_eq!(service("psd-outputs").object_key(&id), "psd-outputs/7_output.jpg");
        assert_eq!(service("/renders/").object_key(&id), "renders/7_output.jpg");
        assert_eq!(service("").object_key(&id), "7_output.jpg");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn editor_sessions_never_overlap() {
        let dir = TempDir::new().expect("temp dir");
        for name in ["1.psd", "2.psd", "3.psd"] {
            std::fs::write(dir.path().join(name), b"8BPS").expect("write source");
        }
        let editor = SlowEditor::default();
        let peak = Arc::clone(&editor.peak);
        let store = InMemoryObjectStore::new("https://bucket.example");
        let service = Arc::new(PsdTextService::new(
            DocumentDirectory::new(dir.path().to_path_buf()),
            Arc::new(editor),
            Arc::new(store.clone()),
            "psd-outputs",
        ));

        let tasks: Vec<_> = ["1", "2", "3"]
            .into_iter()
            .map(|raw| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let id = PsdId::parse(raw).expect("id");
                    service
                        .update_text(
                            &id,
                            vec![
                                json!({ "layer_id": "title", "text": "a" }),
                                json!({ "layer_id": "body", "text": "b" }),
                            ],
                        )
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("join").expect("render published");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(store.put_calls().await, 3);
    }
}
