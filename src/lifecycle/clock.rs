use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Source of monotonic nanosecond readings.
///
/// Readings are only meaningful relative to each other within one process;
/// they are never wall-clock time.
pub trait MonotonicClock: Send + Sync {
    fn now_nanos(&self) -> u64;
}

// ─── SystemClock ─────────────────────────────────────────────────

/// Process-wide monotonic clock backed by [`Instant`].
///
/// Every instance shares one anchor, so readings taken from different
/// `SystemClock` values (or different threads) are comparable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

impl MonotonicClock for SystemClock {
    fn now_nanos(&self) -> u64 {
        // u64 nanos overflow after ~584 years of uptime
        anchor().elapsed().as_nanos() as u64
    }
}

// ─── ManualClock ─────────────────────────────────────────────────

/// Clock whose reading only moves when told to. Used to drive the
/// lifecycle deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(start_nanos: u64) -> Self {
        Self {
            nanos: AtomicU64::new(start_nanos),
        }
    }

    pub fn set(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
