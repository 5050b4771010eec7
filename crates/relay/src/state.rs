use std::sync::Arc;

use pr_domain::config::Config;

use crate::runtime::TurnProcessor;

/// Shared runtime wiring used by every entry point.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub processor: Arc<TurnProcessor>,
}
