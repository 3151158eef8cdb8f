mod bot;
mod broadcast;
mod config;
mod matcher;
mod notifier;
mod server;
mod state;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chatwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Admin chat: {}", config.telegram.admin_chat_id);
    info!("  Seed keywords: {}", config.monitor.keywords.len());
    info!("  Seed chats: {}", config.monitor.chats.len());
    info!("  Control API: {}:{}", config.server.host, config.server.port);

    // Create shared state
    let state = Arc::new(AppState::new(config));

    // Run the Telegram bot and the control API side by side; either one
    // failing takes the process down.
    info!("Bot is starting...");
    tokio::try_join!(bot::run(state.clone()), server::run(state))?;

    Ok(())
}
