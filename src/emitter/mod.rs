pub mod recent;
pub mod tracing_log;

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::USER_AGENT;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::lifecycle::DerivedMetrics;

pub use recent::{FeedPage, RecentRequestLog};
pub use tracing_log::TracingLogEmitter;

/// Receives one derived-metrics record per completed request.
/// Formatting and persistence are entirely the emitter's business.
pub trait LogEmitter: Send + Sync {
    fn emit(&self, exchange: &Exchange, metrics: &DerivedMetrics);
}

// ─── Exchange ────────────────────────────────────────────────────

/// The parts of a request/response pair an emitter may want to log.
/// Captured up front because the request itself is consumed by the handler.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub request_id: Uuid,
    pub method: String,
    pub uri: String,
    pub version: String,
    pub user_agent: Option<String>,
    /// Filled in once the handler has produced a response.
    pub status: u16,
}

impl Exchange {
    pub fn from_request(request_id: Uuid, req: &Request) -> Self {
        Self {
            request_id,
            method: req.method().to_string(),
            uri: req.uri().to_string(),
            version: format!("{:?}", req.version()),
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            status: 0,
        }
    }
}

// ─── RequestLogRecord ────────────────────────────────────────────

/// One line of the request log: who asked, what came back, how long it took.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLogRecord {
    pub logged_at: DateTime<Utc>,
    #[serde(flatten)]
    pub exchange: Exchange,
    pub metrics: DerivedMetrics,
}

impl RequestLogRecord {
    pub fn new(exchange: &Exchange, metrics: &DerivedMetrics) -> Self {
        Self {
            logged_at: Utc::now(),
            exchange: exchange.clone(),
            metrics: *metrics,
        }
    }

    /// Tab-separated rendering. Interarrival statistics take five columns
    /// (count, min, max, sum, average) and are `-` when absent.
    pub fn to_delimited(&self) -> String {
        let ex = &self.exchange;
        let m = &self.metrics;

        let mut line = String::with_capacity(160);
        let _ = write!(
            line,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.logged_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ex.request_id,
            ex.method,
            ex.uri,
            ex.version,
            ex.user_agent.as_deref().unwrap_or("-"),
            ex.status,
            m.begin_to_handle_millis,
            m.begin_to_end_millis,
            m.first_to_last_content_millis,
        );
        match &m.interarrival {
            Some(s) => {
                let _ = write!(
                    line,
                    "\t{}\t{}\t{}\t{}\t{:.2}",
                    s.count, s.min, s.max, s.sum, s.average
                );
            }
            None => line.push_str("\t-\t-\t-\t-\t-"),
        }
        line
    }
}

// ─── FanoutEmitter ───────────────────────────────────────────────

/// Forwards every record to each wrapped emitter, in order.
#[derive(Default)]
pub struct FanoutEmitter {
    targets: Vec<Arc<dyn LogEmitter>>,
}

impl FanoutEmitter {
    pub fn new(targets: Vec<Arc<dyn LogEmitter>>) -> Self {
        Self { targets }
    }
}

impl LogEmitter for FanoutEmitter {
    fn emit(&self, exchange: &Exchange, metrics: &DerivedMetrics) {
        for target in &self.targets {
            target.emit(exchange, metrics);
        }
    }
}
