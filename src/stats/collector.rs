//! Metrics collection from the final fragment of a generation

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::{GenerationFragment, GenerationRequest};

const NANOS_PER_MS: f64 = 1_000_000.0;

/// Collected metrics from a request/response cycle
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetrics {
    /// Unique request ID
    pub request_id: String,
    /// Timestamp of the request
    pub timestamp: DateTime<Utc>,
    /// Model name (as reported by the server, else as requested)
    pub model: String,
    /// Number of prompt tokens evaluated
    pub prompt_tokens: u64,
    /// Number of generated tokens
    pub completion_tokens: u64,
    /// Prompt processing tokens per second
    pub prompt_tps: f64,
    /// Generation tokens per second
    pub generation_tps: f64,
    /// Prompt processing time in ms
    pub prompt_ms: f64,
    /// Generation time in ms
    pub generation_ms: f64,
    /// Model load time in ms
    pub load_ms: f64,
    /// Server-side total in ms
    pub server_total_ms: f64,
    /// Prompt length in characters
    pub input_len: usize,
    /// Generated text length in characters
    pub output_len: usize,
    /// Number of fragments relayed
    pub fragments: usize,
    /// Whether this was a streaming request
    pub streaming: bool,
    /// Why generation stopped
    pub finish_reason: String,
    /// Wall-clock duration seen by the proxy in ms
    pub duration_ms: f64,
}

impl GenerationMetrics {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            model: "unknown".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            prompt_tps: 0.0,
            generation_tps: 0.0,
            prompt_ms: 0.0,
            generation_ms: 0.0,
            load_ms: 0.0,
            server_total_ms: 0.0,
            input_len: 0,
            output_len: 0,
            fragments: 0,
            streaming: false,
            finish_reason: "unknown".to_string(),
            duration_ms: 0.0,
        }
    }

    /// Extract metrics from the `done` fragment and the originating request
    pub fn from_final_fragment(
        fragment: &GenerationFragment,
        request: &GenerationRequest,
        duration_ms: f64,
    ) -> Self {
        let mut metrics = Self::new();
        metrics.streaming = request.stream;
        metrics.duration_ms = duration_ms;
        metrics.input_len = request.prompt.chars().count();

        metrics.model = fragment
            .model
            .clone()
            .unwrap_or_else(|| request.model.clone());

        metrics.prompt_tokens = fragment.prompt_eval_count.unwrap_or(0);
        metrics.completion_tokens = fragment.eval_count.unwrap_or(0);

        metrics.prompt_ms = nanos_to_ms(fragment.prompt_eval_duration);
        metrics.generation_ms = nanos_to_ms(fragment.eval_duration);
        metrics.load_ms = nanos_to_ms(fragment.load_duration);
        metrics.server_total_ms = nanos_to_ms(fragment.total_duration);

        metrics.prompt_tps = per_second(metrics.prompt_tokens, metrics.prompt_ms);
        metrics.generation_tps = per_second(metrics.completion_tokens, metrics.generation_ms);

        if let Some(ref reason) = fragment.done_reason {
            metrics.finish_reason = reason.clone();
        }

        metrics
    }
}

impl Default for GenerationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn nanos_to_ms(nanos: Option<u64>) -> f64 {
    nanos.map(|n| n as f64 / NANOS_PER_MS).unwrap_or(0.0)
}

fn per_second(tokens: u64, ms: f64) -> f64 {
    if ms > 0.0 {
        tokens as f64 / (ms / 1000.0)
    } else {
        0.0
    }
}
