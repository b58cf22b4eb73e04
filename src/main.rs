//! cortex-mcp - Cortex analyzers and responders over the Model Context Protocol
//!
//! Serves MCP on stdin/stdout so an LLM agent can list Cortex analyzers,
//! run one or all of them on an observable and launch responders.
//!
//! Exit codes:
//!   0 - Clean shutdown (input closed) or successful --check / --init-config
//!   1 - Configuration, connection or I/O error

mod analysis;
mod cli;
mod config;
mod cortex;
mod models;
mod report;
mod server;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use cortex::{CortexApi, CortexClient};
use server::McpServer;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("cortex-mcp v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .cortex-mcp.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    eprintln!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    eprintln!("Set CORTEX_API_KEY (or [cortex].api_key) before starting the server.");
    Ok(())
}

/// Initialize logging on stderr; stdout is reserved for protocol traffic.
///
/// `RUST_LOG` takes precedence over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let client = CortexClient::new(config.client_config())
        .context("Failed to create Cortex client")?;
    info!("Cortex endpoint: {}", client.endpoint());

    if args.check {
        return check_connection(&client).await;
    }

    let server = McpServer::new(config.server.name.clone(), Arc::new(client), config.analysis);
    let stdin = BufReader::new(tokio::io::stdin());
    server.serve(stdin, tokio::io::stdout()).await
}

/// Handle --check: list analyzers once and report.
async fn check_connection(client: &CortexClient) -> Result<()> {
    let analyzers = client
        .list_analyzers()
        .await
        .context("Cortex connectivity check failed")?;

    eprintln!(
        "Connected to {} ({} analyzer(s) enabled)",
        client.endpoint(),
        analyzers.len()
    );
    for analyzer in &analyzers {
        eprintln!("  {} [{}]", analyzer.name, analyzer.data_type_list.join(", "));
    }
    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
