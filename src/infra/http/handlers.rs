use axum::{Extension, Json};
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use psdtext_api_types::UpdatePsdTextResponse;
use serde_json::Value;

use crate::domain::documents::PsdId;

use super::error::{ApiError, messages};
use super::middleware::RequestContext;
use super::state::AppState;

const SUCCESS_MESSAGE: &str = "Text updated and file uploaded successfully";

/// `POST /update-psd-text`
///
/// The body is parsed by hand so that every shape problem is answered with
/// the same JSON error contract, and so malformed `updates` entries reach the
/// processor to be reported per item.
pub async fn update_psd_text(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<UpdatePsdTextResponse>, ApiError> {
    let body = body.map_err(ApiError::from_rejection)?;
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(messages::MISSING_FIELDS, err.to_string()))?;

    let Value::Object(mut fields) = payload else {
        return Err(ApiError::bad_request(
            messages::MISSING_FIELDS,
            "body is not a JSON object",
        ));
    };
    let (Some(psd_id), Some(updates)) = (fields.remove("psd_id"), fields.remove("updates")) else {
        return Err(ApiError::bad_request(
            messages::MISSING_FIELDS,
            "psd_id or updates key absent",
        ));
    };
    let Value::Array(updates) = updates else {
        return Err(ApiError::bad_request(
            messages::UPDATES_NOT_A_LIST,
            "updates is not an array",
        ));
    };
    let id = PsdId::from_value(&psd_id)
        .map_err(|err| ApiError::bad_request(messages::INVALID_PSD_ID, err.to_string()))?;
    ctx.record_document(&id);

    let render = state.service.update_text(&id, updates).await?;

    Ok(Json(UpdatePsdTextResponse {
        success: true,
        message: SUCCESS_MESSAGE.to_string(),
        updated_layers: render.updated_layers,
        failed_layers: render.failed_layers,
        oss_path: render.object_key,
        oss_url: render.public_url,
    }))
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
