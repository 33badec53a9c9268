//! Ollama wire types and NDJSON framing

mod ndjson;
mod ollama;

pub use ndjson::*;
pub use ollama::*;
