//! Tests for proxy pass-through endpoints
//! Everything under /api other than the proxy route is forwarded to the backend

use crate::backend::drain_requests;
use crate::client::{send_get, send_request};
use crate::runner::TestContext;

use super::helpers::{assert_eq_str, assert_true};

/// /health is answered by the proxy itself with plain text "OK"
pub async fn test_health(ctx: TestContext) -> anyhow::Result<()> {
    let url = format!("http://{}/health", ctx.proxy_addr);
    let resp = ctx.http_client.get(&url).send().await
        .map_err(|e| anyhow::anyhow!("Failed to GET /health: {}", e))?;

    assert_true(resp.status().as_u16() == 200, &format!("Expected 200, got {}", resp.status()))?;

    let body = resp.text().await.unwrap_or_default();
    assert_true(
        body.trim() == "OK",
        &format!("Expected proxy health to return 'OK', got: {:?}", body),
    )?;

    Ok(())
}

/// /api/tags passes through
pub async fn test_tags_passthrough(ctx: TestContext) -> anyhow::Result<()> {
    let resp = send_get(&ctx.http_client, &ctx.proxy_addr, "/api/tags").await?;

    assert_true(resp.status == 200, &format!("Expected 200, got {}", resp.status))?;
    let first = resp
        .body
        .pointer("/models/0/name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing models[0].name in {:?}", resp.body))?;
    assert_eq_str(first, "llama3:latest", "model name")?;

    Ok(())
}

/// /api/version passes through
pub async fn test_version_passthrough(ctx: TestContext) -> anyhow::Result<()> {
    let resp = send_get(&ctx.http_client, &ctx.proxy_addr, "/api/version").await?;

    assert_true(resp.status == 200, &format!("Expected 200, got {}", resp.status))?;
    assert_eq_str(resp.get_str("version").unwrap_or_default(), "0.1.32", "version")?;

    Ok(())
}

/// Method, path, query and body reach the backend unchanged
pub async fn test_request_details_preserved(ctx: TestContext) -> anyhow::Result<()> {
    let resp = send_request(
        &ctx.http_client,
        &ctx.proxy_addr,
        reqwest::Method::POST,
        "/api/show?verbose=true",
        Some(serde_json::json!({"name": "llama3"})),
    )
    .await?;

    assert_true(resp.status == 200, &format!("Expected 200, got {}", resp.status))?;
    assert_eq_str(resp.get_str("query").unwrap_or_default(), "verbose=true", "echoed query")?;

    let reqs = drain_requests(&ctx.backend_state);
    assert_true(reqs.len() == 1, &format!("Expected 1 backend request, got {}", reqs.len()))?;
    assert_eq_str(&reqs[0].method, "POST", "method")?;
    assert_eq_str(&reqs[0].path, "/api/show", "path")?;
    assert_eq_str(reqs[0].query.as_deref().unwrap_or_default(), "verbose=true", "query")?;
    assert_true(
        reqs[0].body == serde_json::json!({"name": "llama3"}),
        &format!("Unexpected forwarded body: {}", reqs[0].body),
    )?;

    Ok(())
}

/// Backend status for unknown paths is relayed, not replaced
pub async fn test_unknown_path_status_relayed(ctx: TestContext) -> anyhow::Result<()> {
    let resp = send_get(&ctx.http_client, &ctx.proxy_addr, "/api/nope").await?;

    assert_true(resp.status == 404, &format!("Expected 404, got {}", resp.status))?;

    Ok(())
}
