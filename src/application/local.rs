//! One-shot local run behind the `process` command.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::application::processor::process_text_updates;
use crate::domain::updates::ProcessReport;
use crate::infra::documents::PendingArtifact;
use crate::infra::editor::{EditorBridge, EditorError};

#[derive(Debug, Error)]
pub enum LocalRunError {
    #[error("failed to read {}: {source}", path.display())]
    ReadUpdates {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {message}", path.display())]
    InvalidUpdates { path: PathBuf, message: String },
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error("editor worker failed: {0}")]
    Worker(String),
    #[error("failed to remove render: {0}")]
    Artifact(#[source] std::io::Error),
    #[error("No layers were updated")]
    NoLayersUpdated,
}

#[derive(Debug, Clone)]
pub struct LocalRunOptions {
    pub document: PathBuf,
    pub updates: PathBuf,
    pub output: PathBuf,
    pub keep_output: bool,
}

#[derive(Debug)]
pub struct LocalRun {
    pub report: ProcessReport,
    /// Path of the render when it was kept on disk.
    pub kept_output: Option<PathBuf>,
}

impl LocalRun {
    /// Fails when the run changed nothing, so the command exits non-zero.
    pub fn ensure_updated(&self) -> Result<(), LocalRunError> {
        if self.report.any_updated() {
            Ok(())
        } else {
            Err(LocalRunError::NoLayersUpdated)
        }
    }
}

/// Apply the updates stored in `options.updates` to `options.document`.
///
/// The render is removed afterwards unless `keep_output` is set and a render
/// was exported.
pub async fn run_local(
    editor: Arc<dyn EditorBridge>,
    options: &LocalRunOptions,
) -> Result<LocalRun, LocalRunError> {
    let raw = fs::read(&options.updates)
        .await
        .map_err(|source| LocalRunError::ReadUpdates {
            path: options.updates.clone(),
            source,
        })?;
    let updates = match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Array(updates)) => updates,
        Ok(_) => {
            return Err(LocalRunError::InvalidUpdates {
                path: options.updates.clone(),
                message: "expected a JSON array of updates".to_string(),
            });
        }
        Err(err) => {
            return Err(LocalRunError::InvalidUpdates {
                path: options.updates.clone(),
                message: err.to_string(),
            });
        }
    };

    let artifact = PendingArtifact::new(options.output.clone());
    let document = options.document.clone();
    let output = options.output.clone();
    let report = tokio::task::spawn_blocking(move || {
        process_text_updates(editor.as_ref(), &document, &output, &updates)
    })
    .await
    .map_err(|err| LocalRunError::Worker(err.to_string()))??;

    let kept_output = if options.keep_output && report.any_updated() {
        let kept = artifact.keep();
        info!(
            target = "application::local",
            op = "local::run",
            output = %kept.display(),
            "Render kept"
        );
        Some(kept)
    } else {
        artifact.remove().await.map_err(LocalRunError::Artifact)?;
        None
    };

    Ok(LocalRun {
        report,
        kept_output,
    })
}
