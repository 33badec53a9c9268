//! Ollama generate API types

use serde::{Deserialize, Serialize};

/// Path of the generate endpoint on the inference server
pub const GENERATE_PATH: &str = "/api/generate";

/// Body of a generation request, both as accepted by the proxy and as sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// Ollama streams unless told otherwise
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

impl GenerationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, stream: bool) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream,
        }
    }
}

/// One line of a streamed generate response
///
/// Every field is optional: intermediate fragments carry `response`, the last
/// one carries `done: true` and the timing counters (durations in nanoseconds).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct GenerationFragment {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

impl GenerationFragment {
    /// Read a fragment out of an already-parsed JSON value.
    ///
    /// Values that are valid JSON but not fragment-shaped (numbers, arrays,
    /// objects with mistyped fields) yield an empty fragment rather than an error.
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self::deserialize(value).unwrap_or_default()
    }

    /// The text increment, if there is a non-empty one
    pub fn text(&self) -> Option<&str> {
        self.response.as_deref().filter(|t| !t.is_empty())
    }
}

/// JSON error body returned by the proxy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyErrorBody {
    pub error: String,
    pub details: String,
}

impl ProxyErrorBody {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

/// Response of `GET /api/version`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Response of `GET /api/tags`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<LocalModel>,
}

impl TagsResponse {
    /// Whether `model` is available locally. An exact name wins; an untagged
    /// name matches any local tag of the same model.
    pub fn has_model(&self, model: &str) -> bool {
        if self.models.iter().any(|m| m.name == model) {
            return true;
        }
        !model.contains(':') && self.models.iter().any(|m| m.base_name() == model)
    }
}

/// A locally available model
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_at: Option<String>,
}

impl LocalModel {
    /// Name without the `:tag` suffix
    pub fn base_name(&self) -> &str {
        self.name.split(':').next().unwrap_or(&self.name)
    }
}
