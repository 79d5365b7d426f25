//! API Routes
//!
//! Configures the Axum router: control endpoints under `/__agent` and a
//! fallback that routes everything else through the agent.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    activate_handler, health_handler, install_handler, match_handler, proxy_handler,
    stats_handler, status_handler, AppState,
};

/// Path prefix reserved for control endpoints; never proxied.
pub const CONTROL_PREFIX: &str = "/__agent";

/// Creates the main router.
///
/// # Endpoints
/// - `POST /__agent/install` - Install signal
/// - `POST /__agent/activate` - Activate signal
/// - `GET /__agent/status` - Lifecycle state and generations
/// - `GET /__agent/match` - Inspect a cache lookup
/// - `GET /__agent/stats` - Interception statistics
/// - `GET /__agent/health` - Health check
/// - anything else - intercepted request
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let control = Router::new()
        .route("/install", post(install_handler))
        .route("/activate", post(activate_handler))
        .route("/status", get(status_handler))
        .route("/match", get(match_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler));

    Router::new()
        .nest(CONTROL_PREFIX, control)
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
