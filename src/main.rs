use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use request_lifecycle_log::{config::ServerConfig, logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load configuration ────────────────────────────────────
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())?;

    logging::init(&config.log_filter).context("failed to install tracing subscriber")?;

    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║   ⏱  REQUEST LIFECYCLE LOG                       ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();

    // ── 2. Build router ──────────────────────────────────────────
    let (app, _state) = server::build_app(&config);

    // ── 3. Bind & serve ──────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {} — is it already in use?", config.bind_addr))?;

    info!(
        addr = %config.bind_addr,
        strict_event_ordering = config.strict_event_ordering,
        recent_capacity = config.recent_capacity,
        "server listening"
    );
    info!("request feed JSON → /api/requests, SSE → /api/requests/stream");

    axum::serve(listener, app).await.context("server exited with error")?;
    Ok(())
}
