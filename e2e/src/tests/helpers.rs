//! Common test helpers and NDJSON builders

use serde_json::{json, Value};

// ─── Request builders ────────────────────────────────────────────────────────

/// Build a generation request the way the chat client sends it
pub fn generate_request(prompt: &str) -> Value {
    json!({
        "model": "llama3",
        "prompt": prompt,
        "stream": true
    })
}

// ─── Response builders ────────────────────────────────────────────────────────

/// One intermediate NDJSON fragment
pub fn fragment(text: &str) -> String {
    json!({
        "model": "llama3",
        "created_at": "2024-05-01T10:00:00Z",
        "response": text,
        "done": false
    })
    .to_string()
}

/// Final NDJSON fragment with timing stats
pub fn final_fragment() -> String {
    json!({
        "model": "llama3",
        "created_at": "2024-05-01T10:00:02Z",
        "response": "",
        "done": true,
        "done_reason": "stop",
        "total_duration": 2_000_000_000u64,
        "load_duration": 100_000_000u64,
        "prompt_eval_count": 12,
        "prompt_eval_duration": 200_000_000u64,
        "eval_count": 40,
        "eval_duration": 1_000_000_000u64
    })
    .to_string()
}

/// Fragments for each piece followed by the final fragment
pub fn stream_lines(pieces: &[&str]) -> Vec<String> {
    let mut lines: Vec<String> = pieces.iter().map(|p| fragment(p)).collect();
    lines.push(final_fragment());
    lines
}

/// Join lines into one NDJSON body
pub fn ndjson_body(lines: &[String]) -> Vec<u8> {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.into_bytes()
}

// ─── Assertions ───────────────────────────────────────────────────────────────

/// Assert two strings are equal, with context on failure
pub fn assert_eq_str(actual: &str, expected: &str, label: &str) -> anyhow::Result<()> {
    if actual != expected {
        Err(anyhow::anyhow!("{label}: expected {:?} but got {:?}", expected, actual))
    } else {
        Ok(())
    }
}

/// Assert condition is true, with message
pub fn assert_true(cond: bool, msg: &str) -> anyhow::Result<()> {
    if !cond {
        Err(anyhow::anyhow!("{}", msg))
    } else {
        Ok(())
    }
}
