use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use server::config::{AppConfig, ENV_CONFIG_PATH};
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "templater-server")]
#[command(about = "Resumable function-template generation server", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file
    #[arg(short, long, env = ENV_CONFIG_PATH)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Base URL of the remote generation service
    #[arg(long)]
    service_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::read(path).await,
        None => AppConfig::default(),
    };
    let mut config = config.apply_env();
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(url) = cli.service_url {
        config.generation_service.base_url = url;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    tracing::debug!(config_path = ?cli.config, "Configuration resolved");

    let address = config.bind_address();
    let service_url = config.generation_service.base_url.clone();
    let state = AppState::new(config).context("Failed to create generation client")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(
        service_url = %service_url,
        "Server listening on {}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}
