use std::sync::Arc;

use crate::service::ModbusService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ModbusService>,
}
