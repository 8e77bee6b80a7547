use std::sync::Arc;

use homewatch_service::Config;
use homewatch_service::monitoring::MonitoringEngine;

/// Shared by every handler. The engine is only ever read here; the
/// scheduler owns all writes.
pub struct AppState {
    pub engine: Arc<MonitoringEngine>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(engine: Arc<MonitoringEngine>, config: Config) -> Self {
        Self { engine, config: Arc::new(config) }
    }
}
