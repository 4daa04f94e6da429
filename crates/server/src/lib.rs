//! HTTP transport for the scholar query orchestrator (spec §6) — the
//! collaborator the spec deliberately keeps out of the core's scope, built
//! here so the workspace ships a runnable process. Grounded on
//! `examples/original_source/main.py`'s five routes and on
//! `OfflineIntelligence-offline-intelligence`'s axum router-building
//! pattern (CORS + trace + timeout layers, `Router::with_state`).

pub mod handlers;
pub mod session;
pub mod state;
pub mod types;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Builds the full router: the five documented routes plus the configured
/// static-asset mounts.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/index.html", get(handlers::root))
        .route("/api/query", post(handlers::api_query))
        .route("/api/log-debug", post(handlers::log_debug))
        .route("/api/debug-log", get(handlers::get_debug_log));

    for (mount, dir) in state.static_dirs.iter() {
        if std::path::Path::new(dir).is_dir() {
            router = router.nest_service(mount, ServeDir::new(dir));
        }
    }

    router
        .route("/:filename", get(handlers::serve_file))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(tower_http::timeout::TimeoutLayer::new(Duration::from_secs(120)))
        // Outermost: a handler panic becomes a 500 rather than tearing down the
        // connection, matching spec §7's "uncaught failure" / 500 carve-out.
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
