use anyhow::{Context, Result};
use supplymind_app_server::{CopilotHandler, serve};
use supplymind_retrieval::CopilotConfig;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable naming a TOML config file.
const CONFIG_ENV: &str = "COPILOT_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol messages, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    let handler = CopilotHandler::from_config(&config);
    info!("SupplyMind copilot ready");

    serve(&handler, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Config file from the first argument or `COPILOT_CONFIG`, then the
/// environment layered on top.
fn load_config() -> Result<CopilotConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok());

    let config = match path {
        Some(path) => CopilotConfig::load(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => CopilotConfig::default(),
    };
    Ok(config.with_env_overrides())
}
