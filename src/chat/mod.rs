//! Chat client: conversation state, stream accumulation and the terminal REPL

mod accumulator;
mod client;
mod conversation;
mod markdown;
mod session;
mod terminal;

pub use accumulator::{
    classify_line, ConversationView, GenerationSummary, LineOutcome, RecordingView, StreamAccumulator,
    INVALID_RESPONSE_MESSAGE,
};
pub use client::{rejection_detail, GenerationClient};
pub use conversation::{Conversation, ConversationError, Message, Role, WELCOME_MESSAGE};
pub use markdown::{extract_code_blocks, CodeBlock};
pub use session::{ChatError, ChatSession, SubmitOutcome};
pub use terminal::{run_repl, TerminalView};
