use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    body::Body, extract::MatchedPath, http::Request, middleware::Next, response::Response,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::domain::documents::PsdId;

/// Identifiers of one request, shared by the middleware and the handlers.
///
/// Inserted into both the request and the response extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    document: Arc<OnceLock<String>>,
}

impl RequestContext {
    fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            document: Arc::new(OnceLock::new()),
        }
    }

    /// Remember the document this request addresses. The first id wins.
    pub fn record_document(&self, id: &PsdId) {
        let _ = self.document.set(id.to_string());
    }

    pub fn document(&self) -> Option<&str> {
        self.document.get().map(String::as_str)
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::new();
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let ctx = request.extensions().get::<RequestContext>().cloned();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let request_id = ctx
        .as_ref()
        .map(|ctx| ctx.request_id.as_str())
        .unwrap_or_default();
    let psd_id = ctx
        .as_ref()
        .and_then(RequestContext::document)
        .unwrap_or_default();

    if !(status.is_client_error() || status.is_server_error()) {
        info!(
            target = "psdtext::http::response",
            status = status.as_u16(),
            method = %method,
            route = %route,
            psd_id = psd_id,
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            "request completed",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .cloned()
        .unwrap_or_else(|| "no diagnostic available".to_string());

    if status.is_server_error() {
        error!(
            target = "psdtext::http::response",
            status = status.as_u16(),
            method = %method,
            route = %route,
            psd_id = psd_id,
            elapsed_ms = elapsed_ms,
            source = source,
            detail = %detail,
            chain = ?messages,
            request_id = request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "psdtext::http::response",
            status = status.as_u16(),
            method = %method,
            route = %route,
            psd_id = psd_id,
            elapsed_ms = elapsed_ms,
            source = source,
            detail = %detail,
            chain = ?messages,
            request_id = request_id,
            "client request error",
        );
    }

    response
}
