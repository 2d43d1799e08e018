use tracing::info;

use super::{Exchange, LogEmitter, RequestLogRecord};
use crate::lifecycle::DerivedMetrics;

/// Writes each completed request as one `info` event on the `request_log`
/// target. Where it ends up is decided by the installed subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogEmitter;

impl LogEmitter for TracingLogEmitter {
    fn emit(&self, exchange: &Exchange, metrics: &DerivedMetrics) {
        let record = RequestLogRecord::new(exchange, metrics);
        let interarrival_avg = metrics.interarrival.map(|s| s.average);

        info!(
            target: "request_log",
            request_id = %exchange.request_id,
            method = %exchange.method,
            uri = %exchange.uri,
            status = exchange.status,
            begin_to_handle_ms = metrics.begin_to_handle_millis,
            begin_to_end_ms = metrics.begin_to_end_millis,
            first_to_last_content_ms = metrics.first_to_last_content_millis,
            interarrival_avg_ms = ?interarrival_avg,
            clock_skew = metrics.clock_skew,
            "{}",
            record.to_delimited()
        );
    }
}
