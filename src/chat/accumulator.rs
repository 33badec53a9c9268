//! Folds a chunked NDJSON generation stream into the conversation

use super::conversation::{Conversation, Message};
use crate::api::{GenerationFragment, LineBuffer};

/// Notice appended for every line that is not valid JSON
pub const INVALID_RESPONSE_MESSAGE: &str = "Error: Invalid response from the API.";

/// Display layer that is handed the whole conversation after every change
pub trait ConversationView {
    fn publish(&mut self, messages: &[Message]);
}

/// Classification of a single stream line
#[derive(Debug)]
pub enum LineOutcome {
    /// Whitespace only
    Blank,
    /// A fragment carrying a text increment
    Text(String),
    /// Valid JSON without a text increment; `done` marks the final fragment
    NoText { done: bool },
    /// Not JSON at all
    Invalid(serde_json::Error),
}

pub fn classify_line(line: &str) -> LineOutcome {
    if line.trim().is_empty() {
        return LineOutcome::Blank;
    }

    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(value) => {
            let fragment = GenerationFragment::from_value(&value);
            match fragment.text() {
                Some(text) => LineOutcome::Text(text.to_string()),
                None => LineOutcome::NoText { done: fragment.done },
            }
        }
        Err(e) => LineOutcome::Invalid(e),
    }
}

/// What a single generation did to the conversation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GenerationSummary {
    /// Text increments appended to the reply
    pub fragments: usize,
    /// Lines answered with [`INVALID_RESPONSE_MESSAGE`]
    pub parse_errors: usize,
    /// The body stream ended normally rather than with a transport error
    pub completed: bool,
}

/// Single-pass accumulator for one generation.
///
/// Feed it body chunks as they arrive; each complete line is classified and
/// applied to the conversation, and the view is republished after every
/// change.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    lines: LineBuffer,
    summary: GenerationSummary,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8], conversation: &mut Conversation, view: &mut dyn ConversationView) {
        for line in self.lines.push(chunk) {
            self.apply(&line, conversation, view);
        }
    }

    /// Process the trailing unterminated line, if any, once the stream ends
    pub fn finish(mut self, conversation: &mut Conversation, view: &mut dyn ConversationView) -> GenerationSummary {
        if let Some(line) = self.lines.finish() {
            self.apply(&line, conversation, view);
        }
        self.summary.completed = true;
        self.summary
    }

    /// Stop without flushing; used when the stream broke
    pub fn abandon(self) -> GenerationSummary {
        if self.lines.pending_len() > 0 {
            tracing::debug!(pending = self.lines.pending_len(), "Dropping partial line from broken stream");
        }
        self.summary
    }

    fn apply(&mut self, line: &str, conversation: &mut Conversation, view: &mut dyn ConversationView) {
        match classify_line(line) {
            LineOutcome::Blank => {}
            LineOutcome::NoText { done } => {
                if done {
                    tracing::trace!("Final fragment received");
                }
            }
            LineOutcome::Text(text) => {
                if let Err(e) = conversation.append_to_streaming(&text) {
                    tracing::warn!(error = %e, "Dropping text fragment");
                    return;
                }
                self.summary.fragments += 1;
                view.publish(conversation.messages());
            }
            LineOutcome::Invalid(e) => {
                tracing::warn!(error = %e, line = %line, "Error parsing JSON fragment");
                conversation.push_notice(INVALID_RESPONSE_MESSAGE);
                self.summary.parse_errors += 1;
                view.publish(conversation.messages());
            }
        }
    }
}

/// View that keeps every published snapshot; handy for tests and batch use
#[derive(Debug, Default)]
pub struct RecordingView {
    pub snapshots: Vec<Vec<Message>>,
}

impl RecordingView {
    pub fn last(&self) -> Option<&[Message]> {
        self.snapshots.last().map(Vec::as_slice)
    }
}

impl ConversationView for RecordingView {
    fn publish(&mut self, messages: &[Message]) {
        self.snapshots.push(messages.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming_conversation() -> Conversation {
        let mut conv = Conversation::new();
        conv.push_user("hi").unwrap();
        conv.begin_assistant().unwrap();
        conv
    }

    fn run<C: AsRef<[u8]>>(chunks: &[C]) -> (Conversation, RecordingView, GenerationSummary) {
        let mut conv = streaming_conversation();
        let mut view = RecordingView::default();
        let mut acc = StreamAccumulator::new();
        for chunk in chunks {
            acc.feed(chunk.as_ref(), &mut conv, &mut view);
        }
        let summary = acc.finish(&mut conv, &mut view);
        conv.finish_assistant();
        (conv, view, summary)
    }

    #[test]
    fn test_classify_line() {
        assert!(matches!(classify_line("   "), LineOutcome::Blank));
        assert!(matches!(classify_line(r#"{"response":"x"}"#), LineOutcome::Text(t) if t == "x"));
        assert!(matches!(classify_line(r#"{"response":""}"#), LineOutcome::NoText { done: false }));
        assert!(matches!(classify_line(r#"{"done":true}"#), LineOutcome::NoText { done: true }));
        assert!(matches!(classify_line("42"), LineOutcome::NoText { done: false }));
        assert!(matches!(classify_line("{oops"), LineOutcome::Invalid(_)));
    }

    #[test]
    fn test_hello_scenario() {
        let (conv, view, summary) = run(&[b"{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n"]);
        assert_eq!(conv.messages()[1], Message::assistant("Hello"));
        assert_eq!(summary.fragments, 2);
        assert_eq!(summary.parse_errors, 0);
        assert!(summary.completed);
        // one republish per text fragment
        assert_eq!(view.snapshots.len(), 2);
        assert_eq!(view.snapshots[0][1].content, "Hel");
    }

    #[test]
    fn test_concatenation_in_arrival_order() {
        let pieces = ["The", " quick", " brown", " fox", " ü", "ber", "\n", "```"];
        let mut body = String::new();
        for p in pieces {
            body.push_str(&serde_json::json!({"response": p}).to_string());
            body.push('\n');
        }
        body.push_str("{\"response\":\"\",\"done\":true}\n");

        let (conv, _, summary) = run(&[body.as_bytes()]);
        assert_eq!(conv.messages()[1].content, pieces.concat());
        assert_eq!(summary.fragments, pieces.len());
    }

    #[test]
    fn test_chunk_boundaries_do_not_matter() {
        let body = "{\"response\":\"héllo\"}\n\n{\"response\":\" wörld\"}\n".as_bytes();
        let whole = run(&[body]).0.messages()[1].content.clone();

        for cut in 1..body.len() {
            let (conv, _, summary) = run(&[&body[..cut], &body[cut..]]);
            assert_eq!(conv.messages()[1].content, whole, "cut at {}", cut);
            assert_eq!(summary.parse_errors, 0, "cut at {}", cut);
        }
        assert_eq!(whole, "héllo wörld");
    }

    #[test]
    fn test_blank_lines_are_noops() {
        let (conv, view, summary) = run(&[b"\n   \n{\"response\":\"a\"}\n\r\n\n"]);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].content, "a");
        assert_eq!(summary.parse_errors, 0);
        assert_eq!(view.snapshots.len(), 1);
    }

    #[test]
    fn test_malformed_line_adds_one_notice() {
        let (conv, _, summary) = run(&[b"{\"response\":\"Hel\"}\nnot json\n{\"response\":\"lo\"}\n"]);
        let messages = conv.messages();

        assert_eq!(summary.parse_errors, 1);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("Hello"));
        assert_eq!(messages[2], Message::assistant(INVALID_RESPONSE_MESSAGE));
    }

    #[test]
    fn test_overlong_line_is_one_invalid_response() {
        let mut body = vec![b'x'; crate::api::MAX_LINE_SIZE + 100];
        body.extend_from_slice(b"\n{\"response\":\"ok\"}\n");

        let (conv, _, summary) = run(&[&body[..4096], &body[4096..]]);
        let messages = conv.messages();

        assert_eq!(summary.parse_errors, 1);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], Message::assistant("ok"));
        assert_eq!(messages[2], Message::assistant(INVALID_RESPONSE_MESSAGE));
    }

    #[test]
    fn test_unterminated_last_line_is_flushed() {
        let (conv, _, summary) = run(&[b"{\"response\":\"a\"}\n{\"response\":\"b\"}"]);
        assert_eq!(conv.messages()[1].content, "ab");
        assert_eq!(summary.fragments, 2);
    }

    #[test]
    fn test_abandon_drops_partial_line() {
        let mut conv = streaming_conversation();
        let mut view = RecordingView::default();
        let mut acc = StreamAccumulator::new();
        acc.feed(b"{\"response\":\"a\"}\n{\"resp", &mut conv, &mut view);
        let summary = acc.abandon();

        assert!(!summary.completed);
        assert_eq!(summary.fragments, 1);
        assert_eq!(conv.streaming_content(), Some("a"));
    }
}
