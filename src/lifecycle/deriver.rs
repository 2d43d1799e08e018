use serde::Serialize;
use tracing::warn;

use super::store::RequestScopedStore;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Whole milliseconds, truncated.
pub fn nanos_to_millis(nanos: u64) -> u64 {
    nanos / NANOS_PER_MILLI
}

// ─── Output types ────────────────────────────────────────────────

/// Summary of the gaps between consecutive content writes, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InterarrivalStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    pub average: f64,
}

impl InterarrivalStats {
    /// Reduces an ascending sequence of timestamps (nanos) to interarrival
    /// statistics. `None` for fewer than two timestamps.
    pub fn from_sorted(timestamps: &[u64]) -> Option<Self> {
        if timestamps.len() < 2 {
            return None;
        }

        let mut acc = Accumulator::default();
        for pair in timestamps.windows(2) {
            acc.accept(nanos_to_millis(pair[1].saturating_sub(pair[0])));
        }
        Some(acc.finish())
    }
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    min: u64,
    max: u64,
    sum: u64,
}

impl Accumulator {
    fn accept(&mut self, delta_ms: u64) {
        if self.count == 0 || delta_ms < self.min {
            self.min = delta_ms;
        }
        if delta_ms > self.max {
            self.max = delta_ms;
        }
        self.count += 1;
        self.sum += delta_ms;
    }

    fn finish(self) -> InterarrivalStats {
        InterarrivalStats {
            count: self.count,
            min: self.min,
            max: self.max,
            sum: self.sum,
            average: self.sum as f64 / self.count as f64,
        }
    }
}

/// Latency and throughput figures for one completed request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedMetrics {
    /// Arrival to start of handling.
    pub begin_to_handle_millis: u64,
    /// Arrival to completion.
    pub begin_to_end_millis: u64,
    /// Span between first and last content write; `-1` when nothing was written.
    pub first_to_last_content_millis: i64,
    /// Present only with two or more content writes.
    pub interarrival: Option<InterarrivalStats>,
    /// Set when readings taken at different points disagreed about ordering
    /// (completion before arrival, or handling starting after completion).
    /// The affected span is clamped to zero.
    pub clock_skew: bool,
}

// ─── MetricsDeriver ──────────────────────────────────────────────

/// Turns a request's recorded events into [`DerivedMetrics`], exactly once,
/// at completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsDeriver;

impl MetricsDeriver {
    /// Drains the store's content events, so a second call on the same store
    /// sees none of them.
    pub fn derive(&self, store: &RequestScopedStore, now_nanos: u64) -> DerivedMetrics {
        derive_from_events(
            store.arrival_nanos(),
            store.begin_to_handle(),
            store.drain_content_events(),
            now_nanos,
        )
    }
}

/// Core reduction. `timestamps` may arrive in any order; they are sorted
/// here before anything order-dependent is computed.
pub fn derive_from_events(
    arrival_nanos: u64,
    begin_to_handle_nanos: Option<u64>,
    mut timestamps: Vec<u64>,
    now_nanos: u64,
) -> DerivedMetrics {
    // Writers land in arbitrary order; everything below assumes ascending.
    timestamps.sort_unstable();

    let first_to_last_content_millis = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => nanos_to_millis(last - first) as i64,
        _ => -1,
    };

    let mut clock_skew = false;

    if now_nanos < arrival_nanos {
        clock_skew = true;
        warn!(
            arrival_nanos,
            now_nanos, "completion reading precedes arrival; clamping begin_to_end to 0"
        );
    }
    let begin_to_end_millis = nanos_to_millis(now_nanos.saturating_sub(arrival_nanos));

    // Missing marker means handling began immediately.
    let mut begin_to_handle_millis = nanos_to_millis(begin_to_handle_nanos.unwrap_or(0));
    if begin_to_handle_millis > begin_to_end_millis {
        clock_skew = true;
        warn!(
            begin_to_handle_millis,
            begin_to_end_millis, "handling began after completion; clamping begin_to_handle"
        );
        begin_to_handle_millis = begin_to_end_millis;
    }

    DerivedMetrics {
        begin_to_handle_millis,
        begin_to_end_millis,
        first_to_last_content_millis,
        interarrival: InterarrivalStats::from_sorted(&timestamps),
        clock_skew,
    }
}
