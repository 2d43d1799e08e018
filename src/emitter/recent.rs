use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use super::{Exchange, LogEmitter, RequestLogRecord};
use crate::lifecycle::DerivedMetrics;

/// Default number of records kept for the live feed.
pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded feed of the most recently completed requests.
///
/// Every record gets a sequence number on arrival, starting at 1. Readers
/// keep the last number they saw as a cursor and ask only for what came
/// after it. Holds individual records only; it computes nothing across them.
pub struct RecentRequestLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    last_seq: u64,
    records: VecDeque<(u64, RequestLogRecord)>,
}

/// Records newer than a cursor, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    /// Sequence number of the newest record in the log; pass it back to
    /// continue from here.
    pub cursor: u64,
    /// Records newer than the requested cursor that were evicted before
    /// they could be read.
    pub skipped: u64,
    pub records: Vec<RequestLogRecord>,
}

impl RecentRequestLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                last_seq: 0,
                records: VecDeque::with_capacity(capacity + 1),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a record and returns its sequence number.
    pub fn push(&self, record: RequestLogRecord) -> u64 {
        let mut inner = self.inner.lock();
        inner.last_seq += 1;
        let seq = inner.last_seq;
        inner.records.push_back((seq, record));
        if inner.records.len() > self.capacity {
            inner.records.pop_front();
        }
        seq
    }

    /// Everything pushed after `cursor`. A cursor ahead of the log (a
    /// reader left over from an earlier process) reads from the start.
    pub fn since(&self, cursor: u64) -> FeedPage {
        let inner = self.inner.lock();
        let cursor = if cursor > inner.last_seq { 0 } else { cursor };

        let oldest = inner.records.front().map_or(inner.last_seq + 1, |(seq, _)| *seq);
        let skipped = oldest.saturating_sub(cursor + 1);

        let records = inner
            .records
            .iter()
            .filter(|(seq, _)| *seq > cursor)
            .map(|(_, record)| record.clone())
            .collect();

        FeedPage {
            cursor: inner.last_seq,
            skipped,
            records,
        }
    }
}

impl Default for RecentRequestLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogEmitter for RecentRequestLog {
    fn emit(&self, exchange: &Exchange, metrics: &DerivedMetrics) {
        self.push(RequestLogRecord::new(exchange, metrics));
    }
}
