use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nlq_server::{AppConfig, build_service, run_chat, run_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nlq", about = "Ask natural-language questions about a database collection")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, short, env = "NLQ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ask questions interactively.
    Chat,
}

/// `MODE=api` serves, anything else chats.
fn command_from_mode(mode: Option<&str>) -> Command {
    match mode.map(str::trim) {
        Some(m) if m.eq_ignore_ascii_case("api") => Command::Serve { host: None, port: None },
        _ => Command::Chat,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    let command = cli
        .command
        .unwrap_or_else(|| command_from_mode(std::env::var("MODE").ok().as_deref()));

    let service = build_service(&config)?;
    let count = service.initialize().await.context("failed to build the search index")?;
    info!(records = count, "index ready");

    let outcome = match command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            run_server(service.clone(), &host, port.unwrap_or(config.server.port)).await
        }
        Command::Chat => run_chat(service.clone()).await,
    };

    service.close().await.context("failed to close the data source")?;
    outcome
}
