//! HTTP client that talks to the proxy the way the chat client does

use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;

use crate::types::{GenerateResponse, ProxyResponse};

/// Route the proxy serves generation on
pub const PROXY_ROUTE: &str = "/api/ollama-proxy";

/// Build an HTTP client (no connection pooling for test isolation)
pub fn build_client() -> Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .pool_max_idle_per_host(0)
        .build()
        .expect("Failed to build reqwest client")
}

/// POST a generation request to the proxy route and collect the relayed body
pub async fn send_generate(
    client: &Client,
    proxy_addr: &str,
    request_body: serde_json::Value,
) -> anyhow::Result<GenerateResponse> {
    send_generate_raw(client, proxy_addr, request_body.to_string()).await
}

/// Same as [`send_generate`] with an arbitrary (possibly invalid) body
pub async fn send_generate_raw(
    client: &Client,
    proxy_addr: &str,
    body: String,
) -> anyhow::Result<GenerateResponse> {
    let url = format!("http://{proxy_addr}{PROXY_ROUTE}");

    let resp = client
        .post(&url)
        .header("Content-Type", "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to send generate request to proxy: {}", e))?;

    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let mut stream = resp.bytes_stream();
    let mut raw: Vec<u8> = Vec::new();
    let mut frames = 0;

    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk.map_err(|e| anyhow::anyhow!("Stream read error: {}", e))?;
        raw.extend_from_slice(&chunk);
        frames += 1;
    }

    Ok(GenerateResponse {
        status,
        content_type,
        raw,
        frames,
    })
}

/// Parse a JSON error body from a generation response
pub fn error_body(resp: &GenerateResponse) -> anyhow::Result<ProxyResponse> {
    let body = serde_json::from_slice(&resp.raw).map_err(|e| {
        anyhow::anyhow!(
            "Proxy error body is not valid JSON: {}: {}",
            e,
            String::from_utf8_lossy(&resp.raw)
        )
    })?;
    Ok(ProxyResponse {
        status: resp.status,
        body,
    })
}

/// Send a request to the proxy's passthrough surface
pub async fn send_request(
    client: &Client,
    proxy_addr: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<ProxyResponse> {
    let url = format!("http://{proxy_addr}{path}");

    let mut req = client.request(method, &url);
    if let Some(body) = body {
        req = req.json(&body);
    }

    let resp = req
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to reach {}: {}", url, e))?;

    let status = resp.status().as_u16();
    let body_text = resp.text().await.unwrap_or_default();

    let body: serde_json::Value = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::String(body_text));

    Ok(ProxyResponse { status, body })
}

/// GET a passthrough path
pub async fn send_get(client: &Client, proxy_addr: &str, path: &str) -> anyhow::Result<ProxyResponse> {
    send_request(client, proxy_addr, reqwest::Method::GET, path, None).await
}
