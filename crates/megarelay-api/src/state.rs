//! Application state shared by all handlers.

use std::sync::Arc;

use megarelay_core::Config;
use megarelay_storage::MegaGateway;

/// Process-wide read-only state: the startup configuration and the storage
/// gateway. Nothing here is mutated after startup; per-request state lives
/// in the handlers.
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<dyn MegaGateway>,
}

impl AppState {
    pub fn new(config: Config, gateway: Arc<dyn MegaGateway>) -> Self {
        AppState { config, gateway }
    }
}
