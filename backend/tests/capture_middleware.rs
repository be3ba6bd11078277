use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use logbook_backend::{
    config::LogbookConfig,
    middleware::AuthenticatedUser,
    models::{EntryKind, LogEntry},
    services::{CaptureDispatcher, MemoryEntryStore},
    state::AppState,
    utils::mask::MASKED,
};
use serde_json::{json, Value};
use tokio::time::{sleep, Duration};

#[path = "support/mod.rs"]
mod support;

async fn echo(body: Bytes) -> Bytes {
    body
}

async fn login() -> Response {
    let mut response = Json(json!({"access_token": "abc.def.ghi", "user": 42})).into_response();
    response.extensions_mut().insert(AuthenticatedUser(42));
    response
}

async fn events() -> Response {
    ([(CONTENT_TYPE, "text/event-stream")], "data: tick\n\n").into_response()
}

fn host() -> Router<AppState> {
    Router::new()
        .route("/api/users/{id}", post(echo))
        .route("/api/login", post(login))
        .route("/api/events", get(events))
        .route("/health-check", get(|| async { "ok" }))
        .route("/boom", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
}

fn build(logbook: LogbookConfig) -> (Router, std::sync::Arc<MemoryEntryStore>) {
    let (state, store) = support::memory_state(logbook);
    (logbook_backend::app(host(), state), store)
}

async fn only_entry(store: &MemoryEntryStore) -> LogEntry {
    let mut entries = store.snapshot().await;
    assert_eq!(entries.len(), 1, "expected exactly one entry");
    entries.remove(0)
}

fn json_body(raw: Option<&str>) -> Value {
    serde_json::from_str(raw.expect("body recorded")).expect("json body")
}

#[tokio::test]
async fn json_exchange_is_recorded_with_masking() {
    let (app, store) = build(LogbookConfig::default());
    let payload = r#"{"name":"john","password":"s3cret","profile":{"api_key":"k"}}"#;

    let response = support::send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/users/7?notify=true")
            .header("host", "app.test")
            .header(CONTENT_TYPE, "application/json")
            .header("authorization", "Bearer 0123456789abcdef")
            .header("x-forwarded-for", "198.51.100.7")
            .header("user-agent", "integration-test")
            .body(Body::from(payload))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response.headers()["x-request-id"].to_str().unwrap().to_string();
    let echoed = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(echoed.as_ref(), payload.as_bytes());

    let entry = only_entry(&store).await;
    assert_eq!(entry.kind, EntryKind::Request);
    assert_eq!(entry.method.as_deref(), Some("POST"));
    assert_eq!(entry.url.as_deref(), Some("http://app.test/api/users/7?notify=true"));
    assert_eq!(entry.endpoint.as_deref(), Some("/api/users/{id}"));
    assert_eq!(entry.status_code, Some(200));
    assert!(entry.response_time_ms.unwrap() >= 0.0);
    assert_eq!(entry.ip_address.as_deref(), Some("198.51.100.7"));
    assert_eq!(entry.user_agent.as_deref(), Some("integration-test"));
    assert_eq!(entry.token_id.as_deref(), Some("01234567***"));

    let expected = json!({"name": "john", "password": MASKED, "profile": {"api_key": MASKED}});
    assert_eq!(json_body(entry.request_body.as_deref()), expected);
    assert_eq!(json_body(entry.response_body.as_deref()), expected);

    let headers = entry.request_headers.unwrap().0;
    assert_eq!(headers["authorization"], json!([MASKED]));

    let metadata = entry.metadata.unwrap().0;
    assert_eq!(metadata["route"], json!("/api/users/{id}"));
    assert_eq!(metadata["has_auth_token"], json!(true));
    assert_eq!(metadata["is_authenticated"], json!(false));
    assert_eq!(metadata["request_id"], json!(request_id));
}

#[tokio::test]
async fn excluded_routes_are_not_recorded() {
    let (app, store) = build(LogbookConfig::default());

    let response = support::send(
        app.clone(),
        Request::builder()
            .uri("/health-check")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = support::send(
        app,
        Request::builder()
            .uri("/logbook/api/entries")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn custom_admin_prefix_is_not_recorded() {
    let (app, store) = build(LogbookConfig {
        route_prefix: "ops/audit".into(),
        ..LogbookConfig::default()
    });

    let response = support::send(
        app,
        Request::builder()
            .uri("/ops/audit/api/entries")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn principal_from_response_is_attributed() {
    let (app, store) = build(LogbookConfig::default());

    support::send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .body(Body::from(r#"{"email":"a@b.c","password":"pw"}"#))
            .unwrap(),
    )
    .await;

    let entry = only_entry(&store).await;
    assert_eq!(entry.user_id, Some(42));
    assert_eq!(
        json_body(entry.response_body.as_deref())["access_token"],
        json!(MASKED)
    );
    assert_eq!(entry.metadata.unwrap().0["is_authenticated"], json!(true));
}

#[tokio::test]
async fn oversized_bodies_pass_through_but_are_not_stored() {
    let (app, store) = build(LogbookConfig {
        max_buffered_body_bytes: 16,
        ..LogbookConfig::default()
    });
    let payload = "x".repeat(64);

    let response = support::send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/users/1")
            .body(Body::from(payload.clone()))
            .unwrap(),
    )
    .await;

    let echoed = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(echoed.as_ref(), payload.as_bytes());

    let entry = only_entry(&store).await;
    assert_eq!(entry.request_body, None);
    assert_eq!(entry.response_body, None);
}

#[tokio::test]
async fn long_bodies_are_truncated() {
    let (app, store) = build(LogbookConfig {
        truncate_body_at: 10,
        ..LogbookConfig::default()
    });

    support::send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/users/1")
            .body(Body::from("plain text that is long"))
            .unwrap(),
    )
    .await;

    let entry = only_entry(&store).await;
    assert_eq!(entry.request_body.as_deref(), Some("plain text...[TRUNCATED]"));
}

#[tokio::test]
async fn event_streams_are_not_buffered() {
    let (app, store) = build(LogbookConfig::default());

    let response = support::send(
        app,
        Request::builder()
            .uri("/api/events")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body.as_ref(), b"data: tick\n\n");

    let entry = only_entry(&store).await;
    assert_eq!(entry.response_body, None);
    assert_eq!(entry.endpoint.as_deref(), Some("/api/events"));
}

#[tokio::test]
async fn unmatched_paths_fall_back_to_raw_path() {
    let (app, store) = build(LogbookConfig::default());

    let response = support::send(
        app,
        Request::builder()
            .uri("/api/missing/12")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let entry = only_entry(&store).await;
    assert_eq!(entry.endpoint.as_deref(), Some("/api/missing/12"));
    assert_eq!(entry.status_code, Some(404));
}

#[tokio::test]
async fn disabled_logbook_records_nothing() {
    let (app, store) = build(LogbookConfig {
        enabled: false,
        ..LogbookConfig::default()
    });

    support::send(
        app,
        Request::builder().uri("/boom").body(Body::empty()).unwrap(),
    )
    .await;

    assert!(store.snapshot().await.is_empty());
}

#[tokio::test]
async fn deferred_mode_records_after_response() {
    let (state, store) = support::memory_state(LogbookConfig {
        async_logging: true,
        ..LogbookConfig::default()
    });
    let (dispatcher, _worker) = CaptureDispatcher::spawn(state.logbook.clone(), "default", 16);
    let app = logbook_backend::app(host(), state.with_dispatcher(dispatcher));

    let response = support::send(
        app,
        Request::builder().uri("/boom").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let mut entries = Vec::new();
    for _ in 0..100 {
        entries = store.snapshot().await;
        if !entries.is_empty() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status_code, Some(500));
    assert!(entries[0].is_error());
}
