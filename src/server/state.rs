// Shared server state
// Immutable after startup: configuration plus the dispatcher built from it

use crate::config::Config;
use crate::dispatch::Dispatcher;

/// Application state shared by every connection
pub struct AppState {
    pub config: Config,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(config: Config, dispatcher: Dispatcher) -> Self {
        Self { config, dispatcher }
    }

    pub const fn access_log(&self) -> bool {
        self.config.logging.access_log
    }
}
