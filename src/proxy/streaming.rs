//! Streaming relay of upstream response bodies

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::time::Instant;

use crate::api::{GenerationFragment, GenerationRequest, LineBuffer};
use crate::config::{StatsConfig, StatsFormat};
use crate::stats::{format_metrics, GenerationMetrics};

/// Relay a successful generate response as `text/plain`, byte for byte.
///
/// The body is never buffered; when stats are enabled each chunk is also fed
/// to a [`StatsTap`] that logs metrics once the final fragment goes by.
pub fn relay_generation_stream(
    upstream: reqwest::Response,
    request: GenerationRequest,
    stats: &StatsConfig,
    start: Instant,
) -> Response {
    let mut tap = StatsTap::new(request, stats, start);

    let stream = upstream.bytes_stream().map(move |chunk_result| match chunk_result {
        Ok(chunk) => {
            tap.observe(&chunk);
            Ok(chunk)
        }
        Err(e) => {
            tracing::error!(error = %e, "Error reading generation stream chunk");
            Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        }
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Relay any upstream response unchanged: status, headers and streamed body
pub fn relay_passthrough_stream(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let headers = filter_response_headers(upstream.headers());

    let stream = upstream.bytes_stream().map(|chunk_result| {
        chunk_result.map_err(|e| {
            tracing::error!(error = %e, "Error reading pass-through stream chunk");
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })
    });

    (status, headers, Body::from_stream(stream)).into_response()
}

/// Drop headers that describe the upstream framing rather than the content
fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if name == header::CONTENT_LENGTH
            || name == header::TRANSFER_ENCODING
            || name == header::CONNECTION
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Watches relayed NDJSON for the final fragment and logs generation metrics
struct StatsTap {
    enabled: bool,
    format: StatsFormat,
    request: GenerationRequest,
    start: Instant,
    lines: LineBuffer,
    fragments: usize,
    output_len: usize,
    reported: Option<GenerationMetrics>,
}

impl StatsTap {
    fn new(request: GenerationRequest, stats: &StatsConfig, start: Instant) -> Self {
        Self {
            enabled: stats.enabled,
            format: stats.format,
            request,
            start,
            lines: LineBuffer::new(),
            fragments: 0,
            output_len: 0,
            reported: None,
        }
    }

    fn observe(&mut self, chunk: &[u8]) {
        if !self.enabled || self.reported.is_some() {
            return;
        }
        for line in self.lines.push(chunk) {
            self.observe_line(&line);
        }
    }

    fn observe_line(&mut self, line: &str) {
        if line.trim().is_empty() || self.reported.is_some() {
            return;
        }

        let value = match serde_json::from_str::<serde_json::Value>(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Relayed line is not JSON, skipping for stats");
                return;
            }
        };

        let fragment = GenerationFragment::from_value(&value);
        self.fragments += 1;
        if let Some(text) = fragment.text() {
            self.output_len += text.chars().count();
        }

        if fragment.done {
            self.report(&fragment);
        }
    }

    fn report(&mut self, fragment: &GenerationFragment) {
        let mut metrics = GenerationMetrics::from_final_fragment(
            fragment,
            &self.request,
            self.start.elapsed().as_millis() as f64,
        );
        metrics.fragments = self.fragments;
        metrics.output_len = self.output_len;

        let formatted = format_metrics(&metrics, self.format);
        if self.format == StatsFormat::Pretty {
            tracing::info!("\n{}", formatted);
        } else {
            tracing::info!("{}", formatted);
        }

        self.reported = Some(metrics);
    }
}

impl Drop for StatsTap {
    fn drop(&mut self) {
        if !self.enabled || self.reported.is_some() {
            return;
        }
        // Non-streamed responses are a single object, often without a newline
        if let Some(line) = self.lines.finish() {
            self.observe_line(&line);
        }
        if self.reported.is_none() {
            tracing::debug!(
                fragments = self.fragments,
                duration_ms = self.start.elapsed().as_millis() as u64,
                "Generation stream ended without a final fragment"
            );
        }
    }
}
