use std::sync::Arc;

use crate::service::DownlinkService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DownlinkService>,
}
