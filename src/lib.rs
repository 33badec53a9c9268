//! ollama-chat: streaming chat client and forwarding proxy for Ollama
//!
//! Features:
//! - Proxy route that relays `/api/generate` NDJSON streams byte for byte
//! - Generic `/api/*` passthrough to the inference server
//! - Stream accumulator that folds generation fragments into a conversation
//! - Per-generation stats logging (tokens, tokens/sec, timing)

pub mod api;
pub mod chat;
pub mod config;
pub mod proxy;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use chat::{ChatSession, Conversation, StreamAccumulator};
pub use config::AppConfig;
pub use proxy::run_server;
