//! Test registry - all test cases are registered here

pub mod helpers;
pub mod passthrough;

use crate::runner::{Needs, TestCase};

/// Build and return all test cases
///
/// Each test queues what the mock Ollama should stream, then drives either
/// the real proxy over HTTP or the real `ask` command, and checks both what
/// came out and what the backend received.
pub fn all_tests() -> Vec<TestCase> {
    macro_rules! test {
        ($name:expr, $desc:expr, $func:path, $needs:expr) => {
            TestCase {
                name: $name,
                description: $desc,
                needs: $needs,
                run: Box::new(|ctx| Box::pin($func(ctx))),
            }
        };
        ($name:expr, $desc:expr, $func:path) => {
            test!($name, $desc, $func, Needs::Proxy)
        };
    }

    vec![
        // ── Generation relay ──────────────────────────────────────────────────
        test!(
            "basic/stream_relayed_verbatim",
            "NDJSON stream reaches the client byte for byte as text/plain",
            basic::test_stream_relayed_verbatim
        ),
        test!(
            "basic/request_forwarded",
            "Backend receives exactly {model, prompt, stream} on /api/generate",
            basic::test_request_forwarded
        ),
        test!(
            "basic/split_lines_survive",
            "Lines split across backend frames arrive intact",
            basic::test_split_lines_survive
        ),
        test!(
            "basic/utf8_split_across_frames",
            "Multi-byte characters cut by framing are relayed unchanged",
            basic::test_utf8_split_across_frames
        ),
        test!(
            "basic/stream_is_incremental",
            "Fragments are forwarded as they arrive, not buffered",
            basic::test_stream_is_incremental
        ),

        // ── Error mapping ─────────────────────────────────────────────────────
        test!(
            "errors/backend_error_wrapped",
            "Backend 5xx becomes {error, details} with the same status",
            errors::test_backend_error_wrapped
        ),
        test!(
            "errors/backend_status_preserved",
            "Backend 404 keeps its status through the proxy",
            errors::test_backend_status_preserved
        ),
        test!(
            "errors/invalid_body_rejected",
            "Unparseable request body gets 400 without reaching the backend",
            errors::test_invalid_body_rejected
        ),
        test!(
            "errors/wrong_method_rejected",
            "GET on the proxy route is 405",
            errors::test_wrong_method_rejected
        ),

        // ── Chat client ───────────────────────────────────────────────────────
        test!(
            "chat/ask_prints_reply",
            "`ask` prints the reply accumulated from a split stream",
            chat::test_ask_prints_reply,
            Needs::ChatBinary
        ),
        test!(
            "chat/ask_reports_rejection",
            "`ask` shows the proxy error message and exits non-zero",
            chat::test_ask_reports_rejection,
            Needs::ChatBinary
        ),
        test!(
            "chat/ask_malformed_line",
            "A malformed line yields one notice while the reply keeps streaming",
            chat::test_ask_malformed_line,
            Needs::ChatBinary
        ),
        test!(
            "chat/ask_direct",
            "`ask --direct` talks to /api/generate without the proxy",
            chat::test_ask_direct,
            Needs::ChatBinary
        ),

        // ── Pass-through endpoints ───────────────────────────────────────────────
        test!(
            "passthrough/health",
            "/health is answered by the proxy with OK",
            passthrough::test_health
        ),
        test!(
            "passthrough/tags",
            "/api/tags proxies to backend and returns the model list",
            passthrough::test_tags_passthrough
        ),
        test!(
            "passthrough/version",
            "/api/version proxies to backend",
            passthrough::test_version_passthrough
        ),
        test!(
            "passthrough/request_details_preserved",
            "Method, path, query and body are forwarded unchanged",
            passthrough::test_request_details_preserved
        ),
        test!(
            "passthrough/unknown_path_status_relayed",
            "Backend 404 for unknown /api paths is relayed",
            passthrough::test_unknown_path_status_relayed
        ),
    ]
}
