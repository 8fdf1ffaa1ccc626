mod api;
mod bus;
mod config;
mod inbound;
mod outbound;
mod platform;
mod supervisor;
mod text;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::MastodonClient;
use crate::config::Config;
use crate::platform::mastodon::Adapter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for the bus
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lxbot_mastodon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => Config::from_env().context("Failed to load config from environment")?,
    };

    info!("Configuration loaded successfully");
    info!("  Server: {}", config.base_url);
    info!("  Allow list: {} account(s)", config.allow_list.len());
    info!("  Post timeout: {:?}", config.post_timeout);

    let network = Arc::new(MastodonClient::new(&config.base_url, &config.access_token)?);

    let (inbound_tx, inbound_rx) = mpsc::channel(256);
    let (adapter, _supervisor) = Adapter::boot(&config, network, inbound_tx).await?;

    let writer = tokio::spawn(bus::write_inbound(inbound_rx, tokio::io::stdout()));

    info!("Bot is starting...");
    let stdin = BufReader::new(tokio::io::stdin());
    bus::read_outbound(stdin, |value| {
        adapter.send_value(value);
    })
    .await?;

    // Bus input is gone; keep streaming until the process is stopped.
    tokio::select! {
        result = writer => match result {
            Ok(Err(e)) => error!("Bus output failed: {:#}", e),
            Err(e) => error!("Bus output task panicked: {}", e),
            Ok(Ok(())) => {}
        },
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
