use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::SegQueue;

/// Marks the begin-handling slot as never written.
const UNSET: u64 = u64::MAX;

/// Per-request event storage, shared by every callback that fires for
/// one request.
///
/// Content-write timestamps go into a lock-free append-only queue, so any
/// number of concurrent writers are preserved, identical timestamps
/// included. The begin-handling elapsed time lives in a single atomic slot
/// with last-write-wins semantics.
///
/// The store is created on arrival and dropped with the request; nothing in
/// it is shared across requests.
#[derive(Debug)]
pub struct RequestScopedStore {
    arrival_nanos: u64,
    begin_to_handle_nanos: AtomicU64,
    content_events: SegQueue<u64>,
}

impl RequestScopedStore {
    pub fn new(arrival_nanos: u64) -> Self {
        Self {
            arrival_nanos,
            begin_to_handle_nanos: AtomicU64::new(UNSET),
            content_events: SegQueue::new(),
        }
    }

    /// Monotonic reading taken when the request arrived.
    pub fn arrival_nanos(&self) -> u64 {
        self.arrival_nanos
    }

    pub fn push_content_event(&self, timestamp_nanos: u64) {
        self.content_events.push(timestamp_nanos);
    }

    /// Number of content events currently held.
    pub fn content_event_count(&self) -> usize {
        self.content_events.len()
    }

    /// Removes and returns every recorded content timestamp, in whatever
    /// order the writers happened to land. Callers must sort before
    /// computing anything order-dependent.
    pub fn drain_content_events(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.content_events.len());
        while let Some(ts) = self.content_events.pop() {
            out.push(ts);
        }
        out
    }

    pub fn set_begin_to_handle(&self, elapsed_nanos: u64) {
        // UNSET is reserved; a real elapsed time of u64::MAX is not reachable
        let value = elapsed_nanos.min(UNSET - 1);
        self.begin_to_handle_nanos.store(value, Ordering::Release);
    }

    pub fn begin_to_handle(&self) -> Option<u64> {
        match self.begin_to_handle_nanos.load(Ordering::Acquire) {
            UNSET => None,
            nanos => Some(nanos),
        }
    }
}
