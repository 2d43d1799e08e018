use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

use request_lifecycle_log::{
    config::ServerConfig,
    emitter::{Exchange, LogEmitter, RecentRequestLog},
    lifecycle::{DerivedMetrics, ManualClock, MonotonicClock, SystemClock},
    middleware::X_REQUEST_ID,
    server, AppState,
};

#[derive(Default)]
struct Captured(Mutex<Vec<(Exchange, DerivedMetrics)>>);

impl LogEmitter for Captured {
    fn emit(&self, exchange: &Exchange, metrics: &DerivedMetrics) {
        self.0.lock().push((exchange.clone(), *metrics));
    }
}

impl Captured {
    fn records(&self) -> Vec<(Exchange, DerivedMetrics)> {
        self.0.lock().clone()
    }
}

fn router_with(config: &ServerConfig, clock: Arc<dyn MonotonicClock>) -> (Router, Arc<Captured>) {
    let captured = Arc::new(Captured::default());
    let host = server::lifecycle_host(config, clock, captured.clone());
    let state = Arc::new(AppState {
        recent: Arc::new(RecentRequestLog::default()),
    });
    (server::create_router(state, host), captured)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn no_content_response_completes_without_content_events() {
    let (app, captured) = router_with(&ServerConfig::default(), Arc::new(ManualClock::new(0)));

    let resp = app.oneshot(get("/api/empty")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Recorded before the body is even looked at.
    let records = captured.records();
    assert_eq!(records.len(), 1);
    let (exchange, metrics) = &records[0];
    assert_eq!(exchange.status, 204);
    assert_eq!(exchange.uri, "/api/empty");
    assert_eq!(metrics.first_to_last_content_millis, -1);
    assert_eq!(metrics.interarrival, None);
}

#[tokio::test]
async fn echo_records_single_content_event() {
    let (app, captured) = router_with(&ServerConfig::default(), Arc::new(ManualClock::new(0)));

    let req = Request::builder()
        .method("POST")
        .uri("/api/echo")
        .body(Body::from("hello"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let request_id = resp
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .expect("request id header");
    assert!(resp.headers().contains_key("server-timing"));
    assert!(captured.records().is_empty(), "completion waits for the body");

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"hello");

    let records = captured.records();
    assert_eq!(records.len(), 1);
    let (exchange, metrics) = &records[0];
    assert_eq!(exchange.request_id.to_string(), request_id);
    assert_eq!(exchange.method, "POST");
    assert_eq!(metrics.first_to_last_content_millis, 0);
    assert_eq!(metrics.interarrival, None);
    assert_eq!(metrics.begin_to_end_millis, 0);
}

#[tokio::test]
async fn streamed_chunks_produce_interarrival_stats() {
    let (app, captured) = router_with(&ServerConfig::default(), Arc::new(SystemClock));

    let resp = app
        .oneshot(get("/api/chunks?count=3&interval_ms=20"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"chunk 1\nchunk 2\nchunk 3\n");

    let records = captured.records();
    assert_eq!(records.len(), 1);
    let metrics = records[0].1;
    let stats = metrics.interarrival.expect("three chunks give two gaps");
    assert_eq!(stats.count, 2);
    assert!(metrics.first_to_last_content_millis >= 30);
    assert!(metrics.begin_to_end_millis as i64 >= metrics.first_to_last_content_millis);
    assert!(metrics.begin_to_end_millis >= metrics.begin_to_handle_millis);
}

#[tokio::test]
async fn invalid_parameters_are_still_logged() {
    let (app, captured) = router_with(&ServerConfig::default(), Arc::new(ManualClock::new(0)));

    let resp = app.oneshot(get("/api/chunks?count=5000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], 400);

    let records = captured.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0.status, 400);
}

#[tokio::test]
async fn dropped_body_is_never_logged() {
    let (app, captured) = router_with(&ServerConfig::default(), Arc::new(SystemClock));

    let resp = app
        .oneshot(get("/api/chunks?count=3&interval_ms=10"))
        .await
        .unwrap();
    drop(resp);

    assert!(captured.records().is_empty());
}

#[tokio::test]
async fn handlers_see_their_own_store() {
    let clock = Arc::new(ManualClock::new(1_000));
    let (app, _captured) = router_with(&ServerConfig::default(), clock);

    let resp = app.oneshot(get("/api/lifecycle")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["begin_to_handle_millis"], 0);
    assert_eq!(json["content_events_so_far"], 0);
}

#[tokio::test]
async fn strict_ordering_mode_records_the_same_way() {
    let config = ServerConfig {
        strict_event_ordering: true,
        ..ServerConfig::default()
    };
    let (app, captured) = router_with(&config, Arc::new(ManualClock::new(0)));

    let resp = app
        .oneshot(get("/api/chunks?count=4&interval_ms=1"))
        .await
        .unwrap();
    to_bytes(resp.into_body(), usize::MAX).await.unwrap();

    let records = captured.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1.interarrival.map(|s| s.count), Some(3));
}

#[tokio::test]
async fn completed_requests_show_up_in_the_feed() {
    let (app, state) = server::build_app(&ServerConfig::default());

    let resp = app.clone().oneshot(get("/api/empty")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(state.recent.since(0).records.len(), 1);

    let resp = app.oneshot(get("/api/requests")).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["cursor"], 1);
    assert_eq!(json["skipped"], 0);
    let feed = json["records"].as_array().expect("array of records");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["uri"], "/api/empty");
    assert_eq!(feed[0]["status"], 204);
    assert_eq!(feed[0]["metrics"]["first_to_last_content_millis"], -1);
    assert!(feed[0]["metrics"]["interarrival"].is_null());
}

#[tokio::test]
async fn feed_cursor_skips_what_was_already_read() {
    let (app, _state) = server::build_app(&ServerConfig::default());

    app.clone().oneshot(get("/api/empty")).await.unwrap();
    // The feed read itself completes and lands in the log as record 2.
    let resp = app.clone().oneshot(get("/api/requests")).await.unwrap();
    to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    app.clone().oneshot(get("/api/empty?again")).await.unwrap();

    let resp = app.oneshot(get("/api/requests?since=2")).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["cursor"], 3);
    let feed = json["records"].as_array().expect("array of records");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["uri"], "/api/empty?again");
}

#[tokio::test]
async fn fixed_length_bodies_keep_content_length_on_the_wire() {
    let (app, captured) = router_with(&ServerConfig::default(), Arc::new(ManualClock::new(0)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"POST /api/echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\
              Connection: close\r\n\r\nhello",
        )
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();

    let text = String::from_utf8_lossy(&raw).to_ascii_lowercase();
    assert!(text.starts_with("http/1.1 200"), "{text}");
    assert!(text.contains("content-length: 5\r\n"), "{text}");
    assert!(!text.contains("transfer-encoding"), "{text}");
    assert!(text.ends_with("\r\n\r\nhello"), "{text}");

    // The server may finish the exchange just after the client sees the bytes.
    for _ in 0..50 {
        if !captured.records().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let records = captured.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0.uri, "/api/echo");
    assert_eq!(records[0].1.first_to_last_content_millis, 0);
}
