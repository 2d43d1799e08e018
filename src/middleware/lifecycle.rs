use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    http::HeaderName,
    middleware::Next,
    response::Response,
};
use http_body::{Frame, SizeHint};
use tracing::debug;
use uuid::Uuid;

use super::ordering::OrderingGate;
use crate::emitter::Exchange;
use crate::lifecycle::{LifecycleHooks, MonotonicClock, RequestScopedStore};

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
static SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

/// What the middleware needs from the outside: a clock for arrival
/// readings, the hooks to report to, and whether hook delivery is
/// serialized per request.
#[derive(Clone)]
pub struct LifecycleHost {
    pub clock: Arc<dyn MonotonicClock>,
    pub hooks: Arc<dyn LifecycleHooks>,
    pub strict_event_ordering: bool,
}

impl LifecycleHost {
    pub fn new(clock: Arc<dyn MonotonicClock>, hooks: Arc<dyn LifecycleHooks>) -> Self {
        Self {
            clock,
            hooks,
            strict_event_ordering: false,
        }
    }

    pub fn with_strict_ordering(mut self, strict: bool) -> Self {
        self.strict_event_ordering = strict;
        self
    }
}

/// Drives the lifecycle hooks for every request passing through:
///
///   arrival          — clock reading on entry, stored with the request
///   before-handling  — just before the inner service runs
///   content-written  — once per non-empty data frame handed to the transport
///   completion       — when the body reaches its end
///
/// Also adds `x-request-id` and a `server-timing` entry for begin-to-handle.
/// The body's size hint is passed through untouched, so fixed-length
/// responses keep their `content-length`. The per-request store is
/// available to handlers as an `Extension<Arc<RequestScopedStore>>`.
pub async fn lifecycle_middleware(
    State(host): State<LifecycleHost>,
    mut req: Request,
    next: Next,
) -> Response {
    let store = Arc::new(RequestScopedStore::new(host.clock.now_nanos()));
    let gate = OrderingGate::new(host.strict_event_ordering);
    let mut exchange = Exchange::from_request(Uuid::new_v4(), &req);
    req.extensions_mut().insert(store.clone());

    gate.run(|| host.hooks.before_handling(&store));
    let handle_nanos = store.begin_to_handle().unwrap_or(0);

    let response = next.run(req).await;
    exchange.status = response.status().as_u16();

    let (mut parts, body) = response.into_parts();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = exchange.request_id.to_string().parse() {
        parts.headers.insert(X_REQUEST_ID.clone(), val);
    }
    let server_timing = format!("handle;dur={:.3}", handle_nanos as f64 / 1_000_000.0);
    if let Ok(val) = server_timing.parse() {
        parts.headers.append(SERVER_TIMING.clone(), val);
    }

    // Nothing will ever be polled out of an empty body.
    if body.is_end_stream() {
        gate.run(|| host.hooks.completion(&store, &exchange));
        return Response::from_parts(parts, body);
    }

    let observed = ObservedBody {
        inner: body,
        store,
        hooks: host.hooks.clone(),
        gate,
        exchange: Some(exchange),
    };
    Response::from_parts(parts, Body::new(observed))
}

// ─── ObservedBody ────────────────────────────────────────────────

/// Response body wrapper that reports each data frame and the end of the
/// body. `exchange` is taken on completion, so completion fires at most
/// once; a body that errors or is dropped early never completes.
struct ObservedBody {
    inner: Body,
    store: Arc<RequestScopedStore>,
    hooks: Arc<dyn LifecycleHooks>,
    gate: OrderingGate,
    exchange: Option<Exchange>,
}

impl ObservedBody {
    fn complete(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            let (hooks, store) = (&self.hooks, &self.store);
            self.gate.run(|| hooks.completion(store, &exchange));
        }
    }
}

impl HttpBody for ObservedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = self.get_mut();

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if frame.data_ref().is_some_and(|data| !data.is_empty()) {
                    let (hooks, store) = (&this.hooks, &this.store);
                    this.gate.run(|| hooks.content_written(store));
                }
                // Length-bounded bodies are not polled again once exhausted.
                if this.inner.is_end_stream() {
                    this.complete();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(exchange) = this.exchange.take() {
                    debug!(
                        request_id = %exchange.request_id,
                        error = %err,
                        "response body failed; no log record"
                    );
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.complete();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ObservedBody {
    fn drop(&mut self) {
        if let Some(exchange) = &self.exchange {
            debug!(
                request_id = %exchange.request_id,
                "response dropped before completion; no log record"
            );
        }
    }
}
