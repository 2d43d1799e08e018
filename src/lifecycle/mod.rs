//! Per-request lifecycle timing.
//!
//! Hosts report arrival, start of handling, each content write and
//! completion. Content writes may land concurrently and out of order; they
//! are appended to a lock-free per-request log and only put in order once,
//! at completion, when [`MetricsDeriver`] sorts them and reduces them to a
//! [`DerivedMetrics`] record.

pub mod clock;
pub mod deriver;
pub mod observer;
pub mod recorder;
pub mod store;

pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use deriver::{nanos_to_millis, DerivedMetrics, InterarrivalStats, MetricsDeriver};
pub use observer::{LifecycleHooks, RequestLifecycleObserver};
pub use recorder::EventTimestampRecorder;
pub use store::RequestScopedStore;
