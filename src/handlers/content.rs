use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Extension, Query},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::lifecycle::{nanos_to_millis, RequestScopedStore};

use super::AppError;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkParams {
    /// Number of body chunks to write
    #[serde(default = "default_count")]
    pub count: usize,

    /// Pause between consecutive chunks (ms)
    #[serde(default = "default_interval")]
    pub interval_ms: u64,
}

fn default_count() -> usize {
    5
}
fn default_interval() -> u64 {
    100
}

#[derive(Debug, Serialize)]
pub struct InFlightTiming {
    pub begin_to_handle_millis: Option<u64>,
    pub content_events_so_far: usize,
}

// ─── GET /api/chunks ─────────────────────────────────────────────
/// Streams `count` text chunks, `interval_ms` apart. Each chunk becomes
/// one content-write event.

pub async fn stream_chunks(Query(params): Query<ChunkParams>) -> Result<Response, AppError> {
    if params.count > 1000 {
        return Err(AppError::BadRequest("count must be between 0 and 1000".into()));
    }
    if params.interval_ms == 0 || params.interval_ms > 5000 {
        return Err(AppError::BadRequest(
            "interval_ms must be between 1 and 5000".into(),
        ));
    }

    // First tick fires immediately, the rest every interval_ms
    let interval = tokio::time::interval(Duration::from_millis(params.interval_ms));
    let mut seq = 0usize;
    let chunks = IntervalStream::new(interval)
        .take(params.count)
        .map(move |_| {
            seq += 1;
            Ok::<_, Infallible>(Bytes::from(format!("chunk {seq}\n")))
        });

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], Body::from_stream(chunks)).into_response())
}

// ─── GET /api/empty ──────────────────────────────────────────────

pub async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}

// ─── POST /api/echo ──────────────────────────────────────────────

pub async fn echo(body: Bytes) -> Bytes {
    body
}

// ─── GET /api/lifecycle ──────────────────────────────────────────
/// Reports what has been recorded for this very request so far.

pub async fn in_flight_timing(
    store: Option<Extension<Arc<RequestScopedStore>>>,
) -> Result<Json<InFlightTiming>, AppError> {
    let Extension(store) = store.ok_or_else(|| {
        AppError::Internal("lifecycle middleware is not installed".into())
    })?;

    Ok(Json(InFlightTiming {
        begin_to_handle_millis: store.begin_to_handle().map(nanos_to_millis),
        content_events_so_far: store.content_event_count(),
    }))
}
