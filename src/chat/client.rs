//! HTTP client for generation requests

use crate::api::GenerationRequest;

/// Sends generation requests to a fixed endpoint (the proxy route or the
/// inference server's own `/api/generate`)
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GenerationClient {
    /// No request timeout is set; a generation lasts as long as the stream
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue the request and return as soon as the response headers arrive
    pub async fn send(&self, request: &GenerationRequest) -> Result<reqwest::Response, reqwest::Error> {
        tracing::debug!(endpoint = %self.endpoint, model = %request.model, "Sending generation request");
        self.http.post(&self.endpoint).json(request).send().await
    }
}

/// Turn a non-2xx response into the text shown to the user.
///
/// Uses the `error` string of a JSON body when present, otherwise a generic
/// status message.
pub async fn rejection_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let fallback = format!("HTTP error! status: {}", status.as_u16());

    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(|e| e.as_str())
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(e) => {
            tracing::debug!(error = %e, status = %status, "Error body is not JSON");
            fallback
        }
    }
}
