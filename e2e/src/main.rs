//! End-to-end harness for ollama-chat
//!
//! Starts a mock Ollama server, spawns `ollama-chat run` in front of it, and
//! drives both the proxy route and the `ask` command against the pair.
//!
//!   cargo run                                   # spawn ../target/*/ollama-chat, run everything
//!   cargo run -- --filter chat                  # only cases whose name contains "chat"
//!   cargo run -- list
//!   cargo run -- attach --proxy-addr HOST:PORT  # proxy already running; binary cases skipped

mod backend;
mod client;
mod runner;
mod tests;
mod types;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use runner::{list_tests, run_tests, ChatBinary, TestContext};
use tests::all_tests;

/// Binary candidates, tried in order
const BINARY_CANDIDATES: &[&str] = &["../target/release/ollama-chat", "../target/debug/ollama-chat"];

#[derive(Parser)]
#[command(name = "e2e", about = "End-to-end tests for ollama-chat against a mock Ollama")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Only run cases whose name contains this string
    #[arg(long, short, global = true)]
    filter: Option<String>,

    /// Port for the mock Ollama; keep it off 11434 so a real server is never hit
    #[arg(long, default_value_t = 18080, global = true)]
    backend_port: u16,

    /// ollama-chat binary to spawn (default: release build, then debug build)
    #[arg(long)]
    bin: Option<String>,

    /// Port the spawned proxy listens on
    #[arg(long, default_value_t = 18066)]
    proxy_port: u16,
}

#[derive(Subcommand)]
enum Command {
    /// List the cases
    List,

    /// Use a proxy that is already running and already pointed at the mock backend port
    Attach {
        #[arg(long, default_value = "127.0.0.1:18066")]
        proxy_addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cases = all_tests();

    let summary = match cli.command {
        Some(Command::List) => {
            list_tests(&cases);
            return Ok(());
        }
        Some(Command::Attach { proxy_addr }) => {
            let backend_state = backend::start(cli.backend_port).await?;
            let ctx = TestContext {
                proxy_addr,
                backend_state,
                http_client: client::build_client(),
                chat: None,
            };
            run_tests(&cases, ctx, cli.filter.as_deref()).await
        }
        None => {
            let bin = match cli.bin {
                Some(bin) => bin,
                None => find_binary()?,
            };
            let ports = Ports {
                backend: cli.backend_port,
                proxy: cli.proxy_port,
            };
            let config = ports.write_config()?;
            let result = spawn_and_run(&cases, bin, config.clone(), &ports, cli.filter.as_deref()).await;
            std::fs::remove_file(&config).ok();
            result?
        }
    };

    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// The two ports a spawned run wires together
struct Ports {
    backend: u16,
    proxy: u16,
}

impl Ports {
    /// Config the spawned binary reads for both `run` and `ask`, so the proxy
    /// listen address, the backend URL and the chat endpoint cannot disagree
    fn render_config(&self) -> String {
        format!(
            "server:\n  host: \"127.0.0.1\"\n  port: {}\n\n\
             backend:\n  url: \"http://127.0.0.1:{}\"\n\n\
             stats:\n  enabled: true\n  format: compact\n",
            self.proxy, self.backend
        )
    }

    fn write_config(&self) -> anyhow::Result<PathBuf> {
        let path = std::env::temp_dir().join(format!("ollama-chat-e2e-{}.yaml", std::process::id()));
        std::fs::write(&path, self.render_config())
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
        Ok(path)
    }
}

async fn spawn_and_run(
    cases: &[runner::TestCase],
    bin: String,
    config: PathBuf,
    ports: &Ports,
    filter: Option<&str>,
) -> anyhow::Result<runner::Summary> {
    let backend_state = backend::start(ports.backend).await?;
    println!("Mock Ollama on 127.0.0.1:{}", ports.backend);

    let mut proxy = tokio::process::Command::new(&bin)
        .arg("run")
        .arg("--config")
        .arg(&config)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to spawn '{}': {}", bin, e))?;

    let proxy_addr = format!("127.0.0.1:{}", ports.proxy);
    wait_for_health(&proxy_addr).await?;
    println!("Proxy {} ready at {}", bin.bright_cyan(), proxy_addr);

    let ctx = TestContext {
        proxy_addr,
        backend_state,
        http_client: client::build_client(),
        chat: Some(ChatBinary { bin, config }),
    };
    let summary = run_tests(cases, ctx, filter).await;

    proxy.kill().await.ok();
    Ok(summary)
}

fn find_binary() -> anyhow::Result<String> {
    BINARY_CANDIDATES
        .iter()
        .find(|c| std::path::Path::new(c).exists())
        .map(|c| c.to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No ollama-chat binary at {}; build it first with `cargo build` in the repo root",
                BINARY_CANDIDATES.join(" or ")
            )
        })
}

/// Poll /health until the spawned proxy answers
async fn wait_for_health(addr: &str) -> anyhow::Result<()> {
    let client = client::build_client();
    let url = format!("http://{}/health", addr);

    for _ in 0..50 {
        if client.get(&url).send().await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Err(anyhow::anyhow!("Proxy never answered {} after 10s", url))
}
