//! Apply text updates to a design document and export a JPEG render.

use std::path::Path;
use std::time::Instant;

use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::updates::{NOT_A_TEXT_LAYER, ProcessReport, UpdateOutcome, parse_update};
use crate::infra::editor::{EditorBridge, EditorError, LayerKind, OpenDocument};
use crate::infra::telemetry::{METRIC_LAYER_UPDATES_TOTAL, METRIC_PROCESS_MS};

/// JPEG quality handed to the editor's export, on its 0-12 scale.
pub const JPEG_QUALITY: u8 = 5;

/// Apply `updates` to the document at `document_path` and, when at least one
/// layer changed, export a JPEG copy to `output_path`.
///
/// Per-update problems are collected in the report in input order and never
/// abort the batch. Failing to open, export or close the document is returned
/// as an error; the document is closed on every path once opened.
pub fn process_text_updates(
    editor: &dyn EditorBridge,
    document_path: &Path,
    output_path: &Path,
    updates: &[Value],
) -> Result<ProcessReport, EditorError> {
    let started_at = Instant::now();
    let mut document = OpenDocument::open(editor, document_path)?;

    let report: ProcessReport = updates
        .iter()
        .map(|value| apply_update(&mut document, value))
        .collect();

    if report.any_updated() {
        document.export_jpeg(output_path, JPEG_QUALITY)?;
    }
    document.close()?;

    let elapsed = started_at.elapsed();
    counter!(METRIC_LAYER_UPDATES_TOTAL, "result" => "updated")
        .increment(report.updated_layers.len() as u64);
    counter!(METRIC_LAYER_UPDATES_TOTAL, "result" => "failed")
        .increment(report.failed_layers.len() as u64);
    histogram!(METRIC_PROCESS_MS).record(elapsed.as_secs_f64() * 1000.0);

    info!(
        target = "application::processor",
        op = "processor::process_text_updates",
        result = if report.any_updated() { "exported" } else { "unchanged" },
        elapsed_ms = elapsed.as_millis() as u64,
        document = %document_path.display(),
        updated = report.updated_layers.len(),
        failed = report.failed_layers.len(),
        "Processed text updates"
    );
    Ok(report)
}

fn apply_update(document: &mut OpenDocument, value: &Value) -> UpdateOutcome {
    let update = match parse_update(value) {
        Ok(update) => update,
        Err(failure) => {
            debug!(
                target = "application::processor",
                layer_id = failure.layer_id.as_deref().unwrap_or(""),
                error = %failure.error,
                "Rejected malformed update"
            );
            return UpdateOutcome::Failed(failure);
        }
    };

    let result = match document.layer_kind(&update.layer_id) {
        Ok(LayerKind::Text) => document
            .set_text(&update.layer_id, &update.text)
            .map_err(|err| err.to_string()),
        Ok(LayerKind::Other(_)) => Err(NOT_A_TEXT_LAYER.to_string()),
        Err(err) => Err(err.to_string()),
    };

    match result {
        Ok(()) => UpdateOutcome::Updated(update.layer_id),
        Err(error) => {
            debug!(
                target = "application::processor",
                layer_id = %update.layer_id,
                error = %error,
                "Layer update failed"
            );
            UpdateOutcome::failed(update.layer_id, error)
        }
    }
}
