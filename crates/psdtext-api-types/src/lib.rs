//! Wire types for the psdtext HTTP API.
//!
//! The server parses incoming bodies leniently so malformed entries can be
//! reported per item; clients should build requests from these types.

use serde::{Deserialize, Serialize};

/// Path of the text update endpoint.
pub const UPDATE_PSD_TEXT_PATH: &str = "/update-psd-text";

/// Body of `POST /update-psd-text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePsdTextRequest {
    pub psd_id: String,
    pub updates: Vec<TextUpdate>,
}

/// Replacement contents for one named text layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUpdate {
    pub layer_id: String,
    pub text: String,
}

/// An update that could not be applied.
///
/// `layer_id` is absent when the entry itself was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_id: Option<String>,
    pub error: String,
}

/// Successful response of `POST /update-psd-text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePsdTextResponse {
    pub success: bool,
    pub message: String,
    pub updated_layers: Vec<String>,
    pub failed_layers: Vec<FailedLayer>,
    pub oss_path: String,
    pub oss_url: String,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_layers: Option<Vec<FailedLayer>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_entry_failure_omits_layer_id() {
        let failed = FailedLayer {
            layer_id: None,
            error: "Invalid update format".to_string(),
        };
        let value = serde_json::to_value(&failed).expect("serialize");
        assert_eq!(value, serde_json::json!({ "error": "Invalid update format" }));
    }

    #[test]
    fn error_response_without_failures_is_flat() {
        let body = ErrorResponse {
            error: "PSD file not found".to_string(),
            failed_layers: None,
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value, serde_json::json!({ "error": "PSD file not found" }));
    }
}
