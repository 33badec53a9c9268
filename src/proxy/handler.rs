//! Request handlers for the generate relay and the `/api/*` rewrite

use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::time::Instant;

use super::server::ProxyState;
use super::streaming::{relay_generation_stream, relay_passthrough_stream};
use crate::api::{GenerationRequest, ProxyErrorBody};
use crate::stats::format_request_log;

/// Error message when the inference server rejects a generation
pub const GENERATE_FAILED: &str = "Failed to generate response";

/// Error message when the inference server cannot be reached
pub const CONNECT_FAILED: &str = "Failed to connect to the API";

/// Error message when the incoming body is not a generation request
pub const INVALID_BODY: &str = "Invalid request body";

/// Largest body accepted on the rewrite route
const MAX_PASSTHROUGH_BODY: usize = 1024 * 1024 * 100;

/// Proxy request handler
pub struct ProxyHandler {
    state: ProxyState,
}

impl ProxyHandler {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    /// Relay one generation request to the inference server.
    ///
    /// Single attempt, no retries. Success streams the upstream body back as
    /// `text/plain`; every failure is answered with a JSON error body.
    pub async fn handle_generate(&self, body: Bytes) -> Response {
        let start = Instant::now();

        let request: GenerationRequest = match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting malformed generation request");
                return error_response(StatusCode::BAD_REQUEST, INVALID_BODY, e.to_string());
            }
        };

        tracing::info!("{}", format_request_log(&request));

        let backend_url = self.state.config.backend.generate_url();
        tracing::debug!(backend_url = %backend_url, "Forwarding generation request");

        let upstream = match self
            .state
            .http_client
            .post(&backend_url)
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to inference server");
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, CONNECT_FAILED, e.to_string());
            }
        };

        let status = upstream.status();
        if !status.is_success() {
            let error_text = match upstream.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read inference server error body");
                    return error_response(StatusCode::INTERNAL_SERVER_ERROR, CONNECT_FAILED, e.to_string());
                }
            };
            tracing::error!(
                status = %status,
                error_body = %error_text,
                "Inference server returned error response"
            );
            return error_response(status, GENERATE_FAILED, error_text);
        }

        tracing::debug!(status = %status, "Relaying generation stream");
        relay_generation_stream(upstream, request, &self.state.config.stats, start)
    }

    /// Forward any `/api/*` request to the same path on the inference server
    pub async fn handle_rewrite(&self, req: Request<Body>) -> Response {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let headers = req.headers().clone();
        let path = uri.path();
        let query = uri.query();

        tracing::debug!(method = %method, path = %path, query = ?query, "Rewrite pass-through");

        let body_bytes = match to_bytes(req.into_body(), MAX_PASSTHROUGH_BODY).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Failed to read request body: {}", e))
                    .into_response();
            }
        };

        // Keep the query string as-is (don't parse/re-encode)
        let backend_url = match query {
            Some(q) => format!("{}{}?{}", self.state.config.backend.base_url(), path, q),
            None => format!("{}{}", self.state.config.backend.base_url(), path),
        };

        let mut backend_req = self.state.http_client.request(method, &backend_url);
        for (name, value) in headers.iter() {
            if name == header::HOST || name == header::CONTENT_LENGTH {
                continue;
            }
            backend_req = backend_req.header(name, value);
        }

        match backend_req.body(body_bytes).send().await {
            Ok(resp) => relay_passthrough_stream(resp),
            Err(e) => {
                tracing::error!(error = %e, backend_url = %backend_url, "Rewrite target unreachable");
                (StatusCode::BAD_GATEWAY, format!("Backend error: {}", e)).into_response()
            }
        }
    }
}

fn error_response(status: StatusCode, error: &str, details: String) -> Response {
    (status, Json(ProxyErrorBody::new(error, details))).into_response()
}
