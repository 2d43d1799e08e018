use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ServerConfig;
use crate::emitter::{FanoutEmitter, LogEmitter, RecentRequestLog, TracingLogEmitter};
use crate::handlers;
use crate::lifecycle::{MonotonicClock, RequestLifecycleObserver, SystemClock};
use crate::middleware::{lifecycle_middleware, LifecycleHost};
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>, host: LifecycleHost) -> Router {
    Router::new()
        // ── Demo content endpoints ──────────────────────────────
        .route("/api/chunks", get(handlers::content::stream_chunks))
        .route("/api/empty", get(handlers::content::empty))
        .route("/api/echo", post(handlers::content::echo))
        .route("/api/lifecycle", get(handlers::content::in_flight_timing))
        // ── Request log ─────────────────────────────────────────
        .route("/api/requests", get(handlers::requests::recent_requests))
        .route(
            "/api/requests/stream",
            get(handlers::requests::recent_requests_stream),
        )
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(host, lifecycle_middleware))
        .layer(CorsLayer::permissive())
}

/// Wires the observer to a clock and emitter, honouring the configured
/// ordering mode.
pub fn lifecycle_host(
    config: &ServerConfig,
    clock: Arc<dyn MonotonicClock>,
    emitter: Arc<dyn LogEmitter>,
) -> LifecycleHost {
    let observer = Arc::new(RequestLifecycleObserver::new(clock.clone(), emitter));
    LifecycleHost::new(clock, observer).with_strict_ordering(config.strict_event_ordering)
}

/// Production wiring: system clock, every completed request logged through
/// `tracing` and kept in the recent feed.
pub fn build_app(config: &ServerConfig) -> (Router, Arc<AppState>) {
    let recent = Arc::new(RecentRequestLog::new(config.recent_capacity));
    let targets: Vec<Arc<dyn LogEmitter>> = vec![
        Arc::new(TracingLogEmitter) as Arc<dyn LogEmitter>,
        recent.clone() as Arc<dyn LogEmitter>,
    ];
    let emitter = Arc::new(FanoutEmitter::new(targets));

    let host = lifecycle_host(config, Arc::new(SystemClock), emitter);
    let state = Arc::new(AppState { recent });

    (create_router(state.clone(), host), state)
}
