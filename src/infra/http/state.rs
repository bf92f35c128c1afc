use std::sync::Arc;

use crate::application::service::PsdTextService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PsdTextService>,
}
