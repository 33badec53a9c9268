//! Mock backend server that simulates an Ollama server
//!
//! Serves the endpoints the proxy talks to. Tests pre-configure
//! /api/generate responses via SharedBackendState before each request.

use axum::{
    body::{Body, Bytes},
    extract::{OriginalUri, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::types::{BackendState, MockResponse, ReceivedRequest, SharedBackendState};

/// Default /api/tags body
fn default_tags_response() -> &'static str {
    r#"{"models":[{"name":"llama3:latest","model":"llama3:latest","size":4661224676,"modified_at":"2024-05-01T10:00:00Z"}]}"#
}

/// Default /api/version body
fn default_version_response() -> &'static str {
    r#"{"version":"0.1.32"}"#
}

/// Default fallback response when no response is queued
fn default_generate_response() -> MockResponse {
    MockResponse::ndjson_lines(&[
        r#"{"model":"llama3","created_at":"2024-05-01T10:00:00Z","response":"Default response (no mock queued)","done":false}"#.to_string(),
        r#"{"model":"llama3","created_at":"2024-05-01T10:00:01Z","response":"","done":true,"done_reason":"stop","eval_count":5,"eval_duration":50000000}"#.to_string(),
    ])
}

fn record(state: &SharedBackendState, method: &Method, uri: &axum::http::Uri, body: &[u8]) {
    let body_json = serde_json::from_slice(body).unwrap_or(serde_json::Value::Null);
    state.lock().unwrap().received_requests.push(ReceivedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body: body_json,
    });
}

/// Handle POST /api/generate - streams the next queued response frame by frame
async fn handle_generate(
    State(state): State<SharedBackendState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    record(&state, &method, &uri, &body);

    let mock = state
        .lock()
        .unwrap()
        .response_queue
        .pop_front()
        .unwrap_or_else(default_generate_response);

    let delay = tokio::time::Duration::from_millis(mock.chunk_delay_ms);
    let frames = futures::stream::iter(mock.chunks).then(move |chunk| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, std::io::Error>(Bytes::from(chunk))
    });

    Response::builder()
        .status(mock.status)
        .header("Content-Type", &mock.content_type)
        .body(Body::from_stream(frames))
        .unwrap()
        .into_response()
}

/// Handle POST /api/show - echoes what it received so passthrough can be checked
async fn handle_show(
    State(state): State<SharedBackendState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> impl IntoResponse {
    record(&state, &method, &uri, &body);
    let echoed: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (
        StatusCode::OK,
        [("Content-Type", "application/json")],
        serde_json::json!({
            "modelfile": "FROM llama3",
            "query": uri.query(),
            "request": echoed,
        })
        .to_string(),
    )
}

/// Handle GET /api/tags
async fn handle_tags() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "application/json")],
        default_tags_response(),
    )
}

/// Handle GET /api/version
async fn handle_version() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "application/json")],
        default_version_response(),
    )
}

/// Anything else: 404 like Ollama does
async fn handle_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 page not found")
}

/// Start the mock backend server and return the shared state handle
pub async fn start(port: u16) -> anyhow::Result<SharedBackendState> {
    let state: SharedBackendState = std::sync::Arc::new(std::sync::Mutex::new(BackendState::default()));

    let app = Router::new()
        .route("/api/generate", post(handle_generate))
        .route("/api/show", post(handle_show))
        .route("/api/tags", get(handle_tags))
        .route("/api/version", get(handle_version))
        .fallback(handle_not_found)
        .with_state(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = TcpListener::bind(addr).await
        .map_err(|e| anyhow::anyhow!("Failed to bind mock backend to {}: {}", addr, e))?;

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock backend server failed");
    });

    // Brief pause to let the server start accepting connections
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    Ok(state)
}

/// Helper to configure the next response for /api/generate
pub fn queue_response(state: &SharedBackendState, response: MockResponse) {
    state.lock().unwrap().response_queue.push_back(response);
}

/// Helper to get all requests received since last clear
pub fn drain_requests(state: &SharedBackendState) -> Vec<ReceivedRequest> {
    let mut s = state.lock().unwrap();
    s.received_requests.drain(..).collect()
}
