//! Shared types for the e2e test framework

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A mock response the backend will serve for the next request to /api/generate
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    /// Body frames, written one at a time with `chunk_delay_ms` between them
    pub chunks: Vec<Vec<u8>>,
    pub content_type: String,
    pub chunk_delay_ms: u64,
}

impl MockResponse {
    /// NDJSON stream, one frame per line
    pub fn ndjson_lines(lines: &[String]) -> Self {
        Self::ndjson_frames(lines.iter().map(|l| format!("{l}\n").into_bytes()).collect())
    }

    /// NDJSON stream cut into arbitrary frames (lines may straddle frames)
    pub fn ndjson_frames(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            chunks,
            content_type: "application/x-ndjson".to_string(),
            chunk_delay_ms: 5,
        }
    }

    /// Create an error response
    pub fn error(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            chunks: vec![body.into().into_bytes()],
            content_type: "application/json".to_string(),
            chunk_delay_ms: 0,
        }
    }

    /// Everything the backend will write, concatenated
    pub fn full_body(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

/// Shared state for the mock backend server
#[derive(Debug, Default)]
pub struct BackendState {
    /// Queue of responses to serve - tests push responses, backend pops and serves them
    pub response_queue: VecDeque<MockResponse>,
    /// All requests received by the backend (for inspection)
    pub received_requests: Vec<ReceivedRequest>,
}

/// A request received by the mock backend
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub body: serde_json::Value,
}

pub type SharedBackendState = Arc<Mutex<BackendState>>;

/// Result of a non-streaming proxy request
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ProxyResponse {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.body.get(key)?.as_str()
    }
}

/// Result of a generation request through the proxy - the raw relayed bytes
#[derive(Debug)]
pub struct GenerateResponse {
    pub status: u16,
    pub content_type: String,
    pub raw: Vec<u8>,
    /// Body frames as the client received them
    pub frames: usize,
}

impl GenerateResponse {
    /// Non-blank NDJSON lines of the body
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.raw)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Concatenated `response` fields, in order
    pub fn accumulated_text(&self) -> String {
        let mut result = String::new();
        for line in self.lines() {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&line) {
                if let Some(text) = json.get("response").and_then(|v| v.as_str()) {
                    result.push_str(text);
                }
            }
        }
        result
    }

    /// The final fragment carries `done: true`
    pub fn has_done_fragment(&self) -> bool {
        self.lines()
            .last()
            .and_then(|l| serde_json::from_str::<serde_json::Value>(l).ok())
            .and_then(|j| j.get("done").and_then(|d| d.as_bool()))
            .unwrap_or(false)
    }
}

/// How a single test case ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    /// Not run: the context lacks something the case needs
    Skipped(&'static str),
}

/// Result of a single test case
#[derive(Debug)]
pub struct TestResult {
    pub name: &'static str,
    pub outcome: Outcome,
    pub duration_ms: u64,
}
