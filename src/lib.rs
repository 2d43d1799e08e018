use std::sync::Arc;

pub mod config;
pub mod emitter;
pub mod handlers;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod server;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Feed of recently completed requests. The lifecycle pushes records;
    /// the JSON and SSE endpoints read from it by cursor.
    pub recent: Arc<emitter::RecentRequestLog>,
}
