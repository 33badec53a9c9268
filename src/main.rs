//! ollama-chat: streaming chat client and forwarding proxy for Ollama
//!
//! One binary with two halves:
//! - `run` serves the proxy route in front of the inference server
//! - `chat` / `ask` stream replies into a terminal conversation

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use ollama_chat::{
    api::{TagsResponse, VersionResponse},
    chat::{run_repl, ChatSession, SubmitOutcome, TerminalView},
    config::AppConfig,
    run_server,
};

#[derive(Parser)]
#[command(name = "ollama-chat")]
#[command(version = "0.1.0")]
#[command(about = "Streaming chat client and forwarding proxy for Ollama")]
#[command(long_about = "
ollama-chat talks to a local Ollama server:
  - `run` starts a proxy that relays /api/generate streams unchanged
  - `chat` opens a terminal conversation that renders replies as they stream

Example usage:
  ollama-chat run --port 3000
  ollama-chat chat --model llama3
  ollama-chat ask \"why is the sky blue?\" --direct
")]
struct Cli {
    /// Path to config file (defaults: config.yaml, config.yml, ./config/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy server
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override backend URL (e.g., "http://gpu-box:11434")
        #[arg(long)]
        backend_url: Option<String>,
    },

    /// Interactive chat in the terminal
    Chat {
        /// Override the model name
        #[arg(short, long)]
        model: Option<String>,
        /// Talk to the inference server directly instead of through the proxy
        #[arg(long)]
        direct: bool,
    },

    /// Send one prompt and stream the reply to stdout
    Ask {
        prompt: String,
        #[arg(short, long)]
        model: Option<String>,
        #[arg(long)]
        direct: bool,
    },

    /// Validate configuration file
    CheckConfig,

    /// Test connection to the Ollama server
    TestBackend,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { port, backend_url } => {
            run_proxy(config_path, port, backend_url).await?;
        }
        Commands::Chat { model, direct } => {
            let mut session = open_session(config_path, model, direct)?;
            run_repl(&mut session).await?;
        }
        Commands::Ask { prompt, model, direct } => {
            let mut session = open_session(config_path, model, direct)?;
            ask(&mut session, &prompt).await?;
        }
        Commands::CheckConfig => {
            check_config(config_path);
        }
        Commands::TestBackend => {
            test_backend(config_path).await?;
        }
    }

    Ok(())
}

/// Run the proxy server
async fn run_proxy(
    config_path: Option<&Path>,
    port_override: Option<u16>,
    backend_url_override: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config_or_exit(config_path);

    if let Some(port) = port_override {
        config.server.port = port;
    }
    if let Some(url) = backend_url_override {
        config.backend.url = url;
        config.validate().context("invalid --backend-url")?;
    }

    tracing::info!(
        stats = config.stats.enabled,
        format = ?config.stats.format,
        "Stats logging configured"
    );

    run_server(config).await
}

fn open_session(config_path: Option<&Path>, model: Option<String>, direct: bool) -> anyhow::Result<ChatSession> {
    let config = load_config_or_exit(config_path);
    let model = model.unwrap_or_else(|| config.chat.model.clone());
    let endpoint = config.chat_endpoint(direct);

    tracing::debug!(model = %model, endpoint = %endpoint, "Opening chat session");

    Ok(ChatSession::new(endpoint, model)?)
}

/// One prompt, one streamed reply
async fn ask(session: &mut ChatSession, prompt: &str) -> anyhow::Result<()> {
    let mut view = TerminalView::new();
    // the prompt is on the command line; only print the reply
    view.assume_printed(prompt);

    let outcome = session.submit(prompt, &mut view).await?;
    view.end_turn();

    match outcome {
        SubmitOutcome::Streamed(summary) if summary.completed => Ok(()),
        SubmitOutcome::Ignored => {
            eprintln!("Nothing to send: the prompt is blank");
            std::process::exit(2);
        }
        _ => std::process::exit(1),
    }
}

/// Validate configuration file
fn check_config(config_path: Option<&Path>) {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nBackend:");
            println!("  URL: {}", config.backend.url);
            println!("  Generate: {}", config.backend.generate_url());
            println!("\nChat:");
            println!("  Model: {}", config.chat.model);
            println!("  Endpoint: {}", config.chat_endpoint(false));
            println!("\nStats:");
            println!("  Enabled: {}", config.stats.enabled);
            println!("  Format: {:?}", config.stats.format);
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Test connection to the Ollama server
async fn test_backend(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config_or_exit(config_path);
    let base_url = config.backend.base_url();
    let version_url = format!("{}/api/version", base_url);

    println!("Testing connection to backend: {}", version_url);

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;

    match client.get(&version_url).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                println!("✓ Backend is reachable");
                println!("  Status: {}", resp.status());
                match resp.json::<VersionResponse>().await {
                    Ok(version) => println!("  Ollama version: {}", version.version),
                    Err(e) => println!("  Unexpected /api/version body: {}", e),
                }
            } else {
                println!("✗ Backend returned error status: {}", resp.status());
            }
        }
        Err(e) => {
            println!("✗ Failed to connect to backend: {}", e);
            std::process::exit(1);
        }
    }

    let tags_url = format!("{}/api/tags", base_url);
    println!("\nTesting /api/tags endpoint: {}", tags_url);

    match client.get(&tags_url).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<TagsResponse>().await {
            Ok(tags) => {
                println!("✓ /api/tags endpoint available");
                println!("  Local models: {}", tags.models.len());
                for model in tags.models.iter().take(5) {
                    println!("    - {}", model.name);
                }
                if !tags.has_model(&config.chat.model) {
                    println!("  Model {:?} is not pulled; try: ollama pull {}", config.chat.model, config.chat.model);
                }
            }
            Err(e) => println!("  /api/tags body error: {}", e),
        },
        Ok(resp) => println!("  /api/tags returned: {}", resp.status()),
        Err(e) => println!("  /api/tags error: {}", e),
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&Path>) -> AppConfig {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nWithout --config the built-in defaults are used.");
            eprintln!("To customize, copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
