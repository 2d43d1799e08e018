use tracing::trace;

use super::clock::MonotonicClock;
use super::store::RequestScopedStore;

/// Writes lifecycle timestamps into a request's store.
///
/// Both operations are best-effort side effects: they take no locks and
/// cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventTimestampRecorder;

impl EventTimestampRecorder {
    /// Appends the current monotonic reading as one content-write event.
    /// Safe to call from any number of threads for the same request.
    pub fn record_content_event(&self, store: &RequestScopedStore, clock: &dyn MonotonicClock) {
        let now = clock.now_nanos();
        store.push_content_event(now);
        trace!(timestamp_nanos = now, "content event recorded");
    }

    /// Stores the time from arrival to start of handling. Expected once per
    /// request; a repeated call overwrites the earlier value.
    pub fn record_begin_handling(
        &self,
        store: &RequestScopedStore,
        elapsed_nanos_since_arrival: u64,
    ) {
        store.set_begin_to_handle(elapsed_nanos_since_arrival);
        trace!(elapsed_nanos = elapsed_nanos_since_arrival, "begin handling recorded");
    }
}
