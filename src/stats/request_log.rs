//! Request logging formatter

use crate::api::GenerationRequest;

/// Format a one-line log entry for an incoming generation request
pub fn format_request_log(request: &GenerationRequest) -> String {
    let mut parts = vec![format!("model={}", request.model)];

    if request.stream {
        parts.push("stream".to_string());
    }

    let prompt = normalize_whitespace(&request.prompt);
    if !prompt.is_empty() {
        parts.push(format!("\"{}\"", truncate_message(&prompt)));
    }

    format!("→ {}", parts.join(" "))
}

/// Convert newlines and tabs to single spaces, collapse multiple spaces
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate message according to rules:
/// - If <= 100 chars: show all
/// - If > 100 chars: first 25 + " ... " + last 75
fn truncate_message(s: &str) -> String {
    const MAX_TOTAL: usize = 100;
    const PREFIX_LEN: usize = 25;
    const SUFFIX_LEN: usize = 75;
    const ELLIPSIS: &str = " ... ";

    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= MAX_TOTAL {
        return s.to_string();
    }

    let prefix: String = chars[..PREFIX_LEN].iter().collect();
    let suffix: String = chars[chars.len() - SUFFIX_LEN..].iter().collect();

    format!("{}{}{}", prefix, ELLIPSIS, suffix)
}
