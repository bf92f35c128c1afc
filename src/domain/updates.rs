//! Text updates and their per-layer outcomes.

use psdtext_api_types::FailedLayer;
use serde::Serialize;
use serde_json::Value;

pub use psdtext_api_types::TextUpdate;

pub const INVALID_UPDATE_FORMAT: &str = "Invalid update format";
pub const NOT_A_TEXT_LAYER: &str = "Not a text layer";

/// Parse one entry of the request's `updates` array.
///
/// Entries that are not objects, or lack either key, fail without a layer id.
/// Entries whose keys hold non-string values keep the layer id, rendered as
/// text, so the caller can tell which entry was rejected.
pub fn parse_update(value: &Value) -> Result<TextUpdate, FailedLayer> {
    let Some(entry) = value.as_object() else {
        return Err(malformed(None));
    };
    let (Some(layer_id), Some(text)) = (entry.get("layer_id"), entry.get("text")) else {
        return Err(malformed(None));
    };

    match (layer_id, text) {
        (Value::String(layer_id), Value::String(text)) => Ok(TextUpdate {
            layer_id: layer_id.clone(),
            text: text.clone(),
        }),
        (Value::String(layer_id), _) => Err(malformed(Some(layer_id.clone()))),
        (other, _) => Err(malformed(Some(other.to_string()))),
    }
}

fn malformed(layer_id: Option<String>) -> FailedLayer {
    FailedLayer {
        layer_id,
        error: INVALID_UPDATE_FORMAT.to_string(),
    }
}

/// Result of applying a single update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(String),
    Failed(FailedLayer),
}

impl UpdateOutcome {
    pub fn failed(layer_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Failed(FailedLayer {
            layer_id: Some(layer_id.into()),
            error: error.into(),
        })
    }
}

/// Outcomes of one processing run, split by result and kept in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessReport {
    pub updated_layers: Vec<String>,
    pub failed_layers: Vec<FailedLayer>,
}

impl ProcessReport {
    pub fn record(&mut self, outcome: UpdateOutcome) {
        match outcome {
            UpdateOutcome::Updated(layer_id) => self.updated_layers.push(layer_id),
            UpdateOutcome::Failed(failure) => self.failed_layers.push(failure),
        }
    }

    pub fn any_updated(&self) -> bool {
        !self.updated_layers.is_empty()
    }
}

impl FromIterator<UpdateOutcome> for ProcessReport {
    fn from_iter<I: IntoIterator<Item = UpdateOutcome>>(iter: I) -> Self {
        let mut report = Self::default();
        for outcome in iter {
            report.record(outcome);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_well_formed_entry() {
        let update = parse_update(&json!({ "layer_id": "title", "text": "Hello" }))
            .expect("valid update");
        assert_eq!(update.layer_id, "title");
        assert_eq!(update.text, "Hello");
    }

    #[test]
    fn entries_missing_keys_fail_without_layer_id() {
        for value in [
            json!("title"),
            json!(7),
            json!(null),
            json!({ "layer_id": "title" }),
            json!({ "text": "Hello" }),
            json!([{ "layer_id": "title", "text": "Hello" }]),
        ] {
            let failure = parse_update(&value).expect_err("malformed entry");
            assert_eq!(failure.layer_id, None, "entry {value}");
            assert_eq!(failure.error, INVALID_UPDATE_FORMAT);
        }
    }

    #[test]
    fn non_string_values_keep_the_layer_id() {
        let failure = parse_update(&json!({ "layer_id": "title", "text": 3 }))
            .expect_err("non-string text");
        assert_eq!(failure.layer_id.as_deref(), Some("title"));

        let failure = parse_update(&json!({ "layer_id": 12, "text": "x" }))
            .expect_err("non-string layer id");
        assert_eq!(failure.layer_id.as_deref(), Some("12"));
        assert_eq!(failure.error, INVALID_UPDATE_FORMAT);
    }

    #[test]
    fn report_preserves_input_order() {
        let report: ProcessReport = [
            UpdateOutcome::Updated("b".to_string()),
            UpdateOutcome::failed("x", "missing"),
            UpdateOutcome::Updated("a".to_string()),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.updated_layers, ["b", "a"]);
        assert_eq!(report.failed_layers.len(), 1);
        assert!(report.any_updated());
        assert!(!ProcessReport::default().any_updated());
    }
}
