//! HTTP proxy server

mod handler;
pub mod server;
mod streaming;

pub use handler::{ProxyHandler, CONNECT_FAILED, GENERATE_FAILED, INVALID_BODY};
pub use server::{build_http_client, build_router, run_server, ProxyState};
