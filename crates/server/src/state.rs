//! Shared process-wide state (spec §5): one graph connection pool, one LLM
//! client, and the read-only prompt registry, handed to every request
//! handler through `axum::extract::State`.

use std::sync::Arc;

use axum_extra::extract::cookie::Key;
use scholarqa_config::AppConfig;
use scholarqa_orchestrator::OrchestratorDeps;

#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<OrchestratorDeps>,
    pub cookie_key: Key,
    pub debug_log_path: Arc<str>,
    pub static_dirs: Arc<Vec<(String, String)>>,
    pub timeouts: scholarqa_config::TimeoutConfig,
}

impl AppState {
    pub fn new(config: &AppConfig, deps: OrchestratorDeps) -> Self {
        Self {
            deps: Arc::new(deps),
            cookie_key: Key::derive_from(config.server.session_secret.as_bytes()),
            debug_log_path: Arc::from(config.server.debug_log_path.as_str()),
            static_dirs: Arc::new(config.server.static_dirs.clone()),
            timeouts: config.timeouts.clone(),
        }
    }
}

impl axum::extract::FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
