//! Fenced code block extraction for the copy-code action

use regex::Regex;
use std::sync::OnceLock;

static FENCE: OnceLock<Regex> = OnceLock::new();

/// A fenced block from a markdown reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info-string language (`rust` in ```` ```rust ````), if any
    pub language: Option<String>,
    /// Block body with one trailing newline removed
    pub code: String,
}

fn fence() -> &'static Regex {
    FENCE.get_or_init(|| {
        Regex::new(r"(?ms)^[ \t]*```[ \t]*([\w+#.-]*)[^\n]*\n(.*?)^[ \t]*```[ \t]*$")
            .expect("fenced code pattern is valid")
    })
}

/// Closed fenced blocks in document order; an unterminated fence (a reply
/// still streaming) yields nothing.
pub fn extract_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    fence()
        .captures_iter(markdown)
        .map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str())
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            CodeBlock {
                language,
                code: body.strip_suffix('\n').unwrap_or(body).to_string(),
            }
        })
        .collect()
}
