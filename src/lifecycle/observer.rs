use std::sync::Arc;

use tracing::debug;

use super::clock::MonotonicClock;
use super::deriver::MetricsDeriver;
use super::recorder::EventTimestampRecorder;
use super::store::RequestScopedStore;
use crate::emitter::{Exchange, LogEmitter};

/// The three points in a request's life a host reports to.
///
/// - `before_handling`: exactly once, before application logic runs.
/// - `content_written`: zero or more times, possibly concurrently from
///   different threads, in no guaranteed order.
/// - `completion`: exactly once, after every `content_written` call for the
///   request has been delivered. Never called for aborted requests.
pub trait LifecycleHooks: Send + Sync {
    fn before_handling(&self, store: &RequestScopedStore);
    fn content_written(&self, store: &RequestScopedStore);
    fn completion(&self, store: &RequestScopedStore, exchange: &Exchange);
}

/// Routes lifecycle hooks to the recorder and, on completion, to the
/// deriver and emitter. Holds no per-request state.
pub struct RequestLifecycleObserver {
    clock: Arc<dyn MonotonicClock>,
    recorder: EventTimestampRecorder,
    deriver: MetricsDeriver,
    emitter: Arc<dyn LogEmitter>,
}

impl RequestLifecycleObserver {
    pub fn new(clock: Arc<dyn MonotonicClock>, emitter: Arc<dyn LogEmitter>) -> Self {
        Self {
            clock,
            recorder: EventTimestampRecorder,
            deriver: MetricsDeriver,
            emitter,
        }
    }
}

impl LifecycleHooks for RequestLifecycleObserver {
    fn before_handling(&self, store: &RequestScopedStore) {
        let elapsed = self.clock.now_nanos().saturating_sub(store.arrival_nanos());
        self.recorder.record_begin_handling(store, elapsed);
    }

    fn content_written(&self, store: &RequestScopedStore) {
        self.recorder.record_content_event(store, self.clock.as_ref());
    }

    fn completion(&self, store: &RequestScopedStore, exchange: &Exchange) {
        let metrics = self.deriver.derive(store, self.clock.now_nanos());
        debug!(request_id = %exchange.request_id, ?metrics, "request completed");
        self.emitter.emit(exchange, &metrics);
    }
}
