use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use psdtext_api_types::{ErrorResponse, FailedLayer};

use crate::application::error::ErrorReport;
use crate::application::service::PsdTextError;

pub mod messages {
    pub const MISSING_FIELDS: &str = "Missing psd_id or updates in request";
    pub const UPDATES_NOT_A_LIST: &str = "Updates must be a list of layer updates";
    pub const INVALID_PSD_ID: &str = "Invalid psd_id";
}

/// JSON error response: `{"error": ...}` plus `failed_layers` when relevant.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    failed_layers: Option<Vec<FailedLayer>>,
    report: ErrorReport,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>, report: ErrorReport) -> Self {
        Self {
            status,
            message: message.into(),
            failed_layers: None,
            report,
        }
    }

    pub fn bad_request(message: &'static str, detail: impl Into<String>) -> Self {
        let report =
            ErrorReport::from_message("infra::http::request", StatusCode::BAD_REQUEST, detail);
        Self::new(StatusCode::BAD_REQUEST, message, report)
    }

    pub fn from_rejection(rejection: BytesRejection) -> Self {
        let status = rejection.status();
        let message = rejection.body_text();
        let report = ErrorReport::from_error("infra::http::request", status, &rejection);
        Self::new(status, message, report)
    }
}

impl From<PsdTextError> for ApiError {
    fn from(error: PsdTextError) -> Self {
        let status = match &error {
            PsdTextError::DocumentNotFound => StatusCode::NOT_FOUND,
            PsdTextError::NoLayersUpdated { .. } => StatusCode::BAD_REQUEST,
            PsdTextError::Directory(_)
            | PsdTextError::Editor(_)
            | PsdTextError::Worker(_)
            | PsdTextError::Artifact(_)
            | PsdTextError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let source = match &error {
            PsdTextError::DocumentNotFound | PsdTextError::NoLayersUpdated { .. } => {
                "application::psd_text"
            }
            PsdTextError::Directory(_) | PsdTextError::Artifact(_) => "infra::documents",
            PsdTextError::Editor(_) | PsdTextError::Worker(_) => "infra::editor",
            PsdTextError::Storage(_) => "infra::storage",
        };
        let report = ErrorReport::from_error(source, status, &error);
        let message = error.to_string();

        let mut api_error = Self::new(status, message, report);
        if let PsdTextError::NoLayersUpdated { failed_layers } = error {
            api_error.failed_layers = Some(failed_layers);
        }
        api_error
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            failed_layers: self.failed_layers,
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}
