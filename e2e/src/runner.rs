//! Sequential test runner and report

use colored::Colorize;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Instant;

use crate::types::{Outcome, SharedBackendState, TestResult};

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// What a case needs beyond the proxy and the mock backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Needs {
    Proxy,
    /// Runs the ollama-chat binary itself, so only possible when it was spawned here
    ChatBinary,
}

pub struct TestCase {
    pub name: &'static str,
    pub description: &'static str,
    pub needs: Needs,
    pub run: Box<dyn Fn(TestContext) -> TestFuture + Send + Sync>,
}

#[derive(Clone)]
pub struct TestContext {
    pub proxy_addr: String,
    pub backend_state: SharedBackendState,
    pub http_client: reqwest::Client,
    pub chat: Option<ChatBinary>,
}

/// The ollama-chat binary plus a config pointing its chat client at the proxy under test
#[derive(Clone)]
pub struct ChatBinary {
    pub bin: String,
    pub config: PathBuf,
}

/// Counts over a finished run
#[derive(Debug, Default)]
pub struct Summary {
    pub results: Vec<TestResult>,
}

impl Summary {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    fn print(&self) {
        let passed = self.count(|o| *o == Outcome::Passed);
        let skipped = self.count(|o| matches!(o, Outcome::Skipped(_)));
        let failed = self.failed();
        let total_ms: u64 = self.results.iter().map(|r| r.duration_ms).sum();

        println!();
        for r in &self.results {
            if let Outcome::Failed(e) = &r.outcome {
                println!("  {} {}: {}", "✗".bright_red(), r.name.bright_white(), e);
            }
        }

        let line = format!(
            "{} passed, {} failed, {} skipped in {}ms",
            passed, failed, skipped, total_ms
        );
        if failed == 0 {
            println!("  {}\n", line.bright_green().bold());
        } else {
            println!("  {}\n", line.bright_red().bold());
        }
    }
}

fn reset_backend(state: &SharedBackendState) {
    let mut s = state.lock().unwrap();
    s.response_queue.clear();
    s.received_requests.clear();
}

async fn run_case(case: &TestCase, ctx: &TestContext) -> TestResult {
    if case.needs == Needs::ChatBinary && ctx.chat.is_none() {
        return TestResult {
            name: case.name,
            outcome: Outcome::Skipped("no ollama-chat binary when attached to a running proxy"),
            duration_ms: 0,
        };
    }

    reset_backend(&ctx.backend_state);
    let start = Instant::now();
    let outcome = match (case.run)(ctx.clone()).await {
        Ok(()) => Outcome::Passed,
        // {:#} keeps the anyhow cause chain on one line
        Err(e) => Outcome::Failed(format!("{:#}", e)),
    };

    TestResult {
        name: case.name,
        outcome,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Run every case whose name contains `filter`, printing one line per case
pub async fn run_tests(cases: &[TestCase], ctx: TestContext, filter: Option<&str>) -> Summary {
    let selected: Vec<&TestCase> = cases
        .iter()
        .filter(|c| filter.map_or(true, |f| c.name.contains(f)))
        .collect();

    println!(
        "\n{} {} case(s) against proxy {}\n",
        "ollama-chat e2e:".bright_white().bold(),
        selected.len(),
        ctx.proxy_addr.bright_cyan()
    );

    let mut summary = Summary::default();
    for case in selected {
        let result = run_case(case, &ctx).await;
        match &result.outcome {
            Outcome::Passed => println!("  {} {} ({}ms)", "PASS".bright_green(), case.name, result.duration_ms),
            Outcome::Failed(e) => println!("  {} {}\n       {}", "FAIL".bright_red().bold(), case.name, e),
            Outcome::Skipped(why) => println!("  {} {} ({})", "SKIP".yellow(), case.name, why),
        }
        summary.results.push(result);
    }

    summary.print();
    summary
}

pub fn list_tests(cases: &[TestCase]) {
    for case in cases {
        let marker = match case.needs {
            Needs::Proxy => " ",
            Needs::ChatBinary => "*",
        };
        println!("{} {:<40} {}", marker, case.name.bright_cyan(), case.description);
    }
    println!("\n* runs the ollama-chat binary; skipped by `attach`");
}
