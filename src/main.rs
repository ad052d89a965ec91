mod backend;
mod client;
mod config;
mod cors;
mod engine;
mod error;
mod protocol;
mod relay;
mod server;
mod session;
mod sse;

use backend::BackendClient;
use clap::{Parser, Subcommand};
use config::{Config, ConfigError};
use engine::{Agent, EngineSettings};
use server::ServerState;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Streams reasoning-engine chat over server-sent events.
///
/// Without a subcommand the gateway is started.
#[derive(Parser)]
#[command(name = "chat-gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Command {
    /// Send one prompt to a running gateway and print the answer.
    Chat(client::ChatArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Chat(args)) => {
            init_tracing(true);
            client::run(args).await
        }
        None => serve(cli.config).await,
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing(config.quiet);

    let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
    let settings = match &config.engine_config {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };

    let backend = BackendClient::new(&config.backend_url);
    let agent = Agent::new(api_key, config.model.clone(), settings, backend.clone());
    tracing::info!(model = %config.model, backend = %config.backend_url, "starting gateway");

    let state = ServerState::new(Arc::new(config), backend, Arc::new(agent));
    server::run(Arc::new(state)).await
}

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
