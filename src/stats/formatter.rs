//! Stats formatting for different output formats

use super::GenerationMetrics;
use crate::config::StatsFormat;

/// Format metrics according to the configured format
pub fn format_metrics(metrics: &GenerationMetrics, format: StatsFormat) -> String {
    match format {
        StatsFormat::Pretty => format_pretty(metrics),
        StatsFormat::Json => format_json(metrics),
        StatsFormat::Compact => format_compact(metrics),
    }
}

/// Boxed multi-line format for terminal output
fn format_pretty(m: &GenerationMetrics) -> String {
    format!(
        r#"┌──────────────────────────────────────────────────────────────────┐
│ Generation Metrics                                               │
├──────────────────────────────────────────────────────────────────┤
│ Model: {:58}│
│ Time:  {:58}│
├──────────────────────────────────────────────────────────────────┤
│   Prompt:     {:6} tokens {:9.2} tok/s {:10.1}ms         │
│   Generation: {:6} tokens {:9.2} tok/s {:10.1}ms         │
│   Load: {:10.1}ms   Server total: {:10.1}ms                │
├──────────────────────────────────────────────────────────────────┤
│ Fragments: {:<8} Prompt chars: {:<8} Output chars: {:<8}│
│ Finish: {:57}│
│ Duration: {:53.1}ms│
└──────────────────────────────────────────────────────────────────┘
"#,
        truncate(&m.model, 58),
        m.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        m.prompt_tokens,
        m.prompt_tps,
        m.prompt_ms,
        m.completion_tokens,
        m.generation_tps,
        m.generation_ms,
        m.load_ms,
        m.server_total_ms,
        m.fragments,
        m.input_len,
        m.output_len,
        truncate(&m.finish_reason, 57),
        m.duration_ms,
    )
}

fn format_json(m: &GenerationMetrics) -> String {
    serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string())
}

/// Compact single-line format
fn format_compact(m: &GenerationMetrics) -> String {
    format!(
        "[{}] model={} tokens={}/{} tps={:.1}/{:.1} frags={} {} finish={} dur={:.1}ms",
        m.timestamp.format("%H:%M:%S"),
        m.model,
        m.prompt_tokens,
        m.completion_tokens,
        m.prompt_tps,
        m.generation_tps,
        m.fragments,
        if m.streaming { "stream" } else { "sync" },
        m.finish_reason,
        m.duration_ms
    )
}

/// Truncate to at most `max_len` characters, marking the cut with "..."
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
