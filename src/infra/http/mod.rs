mod error;
mod handlers;
mod middleware;
mod state;

pub use error::{ApiError, messages};
pub use middleware::RequestContext;
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use psdtext_api_types::UPDATE_PSD_TEXT_PATH;

use middleware::{log_responses, set_request_context};

pub const HEALTH_PATH: &str = "/_health";

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route(UPDATE_PSD_TEXT_PATH, post(handlers::update_psd_text))
        .route(HEALTH_PATH, get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
