use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::Deserialize;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::emitter::FeedPage;
use crate::AppState;

/// How often the live feed checks for newly completed requests.
const FEED_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    /// Cursor from a previous page; omitted means from the start.
    #[serde(default)]
    pub since: u64,
}

// ─── GET /api/requests ───────────────────────────────────────────

/// Completed requests newer than `?since=`, oldest first, with the cursor
/// to pass next time.
pub async fn recent_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Json<FeedPage> {
    Json(state.recent.since(query.since))
}

// ─── GET /api/requests/stream ────────────────────────────────────

/// Live feed over Server-Sent Events. Each `requests` event carries only
/// the records completed since the previous one, and its id is the cursor,
/// so a reconnecting client resumes through `Last-Event-ID`. Ticks with
/// nothing new send nothing. The stream never ends, so requests to it are
/// never logged themselves.
pub async fn recent_requests_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut cursor = last_event_id(&headers);

    let stream = IntervalStream::new(tokio::time::interval(FEED_TICK)).filter_map(move |_| {
        let page = state.recent.since(cursor);
        if page.records.is_empty() && page.skipped == 0 {
            return None;
        }
        cursor = page.cursor;
        feed_event(&page).map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn feed_event(page: &FeedPage) -> Option<Event> {
    match Event::default()
        .event("requests")
        .id(page.cursor.to_string())
        .json_data(page)
    {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, cursor = page.cursor, "could not encode feed page");
            None
        }
    }
}

/// Unparseable or missing ids start the feed from the beginning.
fn last_event_id(headers: &HeaderMap) -> u64 {
    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
