//! Proxy server setup and routing

use axum::{
    body::Bytes,
    extract::State,
    routing::{any, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handler::ProxyHandler;
use crate::config::{AppConfig, PROXY_GENERATE_ROUTE};

/// Shared state for the proxy
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
}

impl ProxyState {
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: build_http_client()?,
            config: Arc::new(config),
        })
    }
}

/// Build the upstream HTTP client.
///
/// No request timeout: a generation runs until the inference server closes
/// the stream.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().pool_max_idle_per_host(10).build()
}

/// Build the router with all proxy routes
pub fn build_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(PROXY_GENERATE_ROUTE, post(generate_handler))
        // Everything else under /api goes straight to the inference server
        .route("/api/*path", any(rewrite_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the proxy server
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let backend = config.backend.base_url().to_string();

    let state = ProxyState::new(config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("ollama-chat proxy listening on {}", addr);
    tracing::info!("Proxying to {}", backend);

    Ok(axum::serve(listener, app).await?)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

async fn generate_handler(State(state): State<ProxyState>, body: Bytes) -> axum::response::Response {
    let handler = ProxyHandler::new(state);
    handler.handle_generate(body).await
}

async fn rewrite_handler(State(state): State<ProxyState>, req: axum::extract::Request) -> axum::response::Response {
    let handler = ProxyHandler::new(state);
    handler.handle_rewrite(req).await
}
