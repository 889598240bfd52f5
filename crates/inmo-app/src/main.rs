//! Inmo application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML (+ env overrides)
//! 2. Open the SQLite database and load the listings feed
//! 3. Build the completion gateway
//! 4. Start the axum REST API server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use inmo_api::routes;
use inmo_api::state::AppState;
use inmo_core::config::InmoConfig;
use inmo_gateway::GeminiGateway;
use inmo_storage::Database;

use crate::cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

fn init_tracing(cli_level: Option<&str>, config_level: &str) {
    let filter = match cli_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config_level)),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = InmoConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);
    let feed_path = args.resolve_feed(config.storage.feed_path.as_deref());

    // Tracing.
    init_tracing(args.log_level.as_deref(), &config.general.log_level);
    tracing::info!("Starting Inmo v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join(&config.storage.db_file);
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Gateway.
    let gateway = GeminiGateway::new(config.gateway.clone())?;
    if config.gateway.api_keys.iter().all(|k| k.trim().is_empty()) {
        tracing::warn!(
            "No gateway credentials configured; chat replies will use the fallback message"
        );
    }

    // State and catalog.
    let state = AppState::new(config.clone(), db, Arc::new(gateway))
        .with_feed_path(feed_path.clone());
    match state.search.store().initialize(feed_path.as_deref()) {
        Some(report) => tracing::info!(
            total = report.total,
            loaded = report.loaded,
            skipped = report.skipped,
            "Listings catalog ready"
        ),
        None => tracing::warn!("Serving without a freshly loaded catalog"),
    }

    // API server.
    if let Err(e) = routes::start_server(&config, state).await {
        tracing::error!(port = config.general.port, error = %e, "API server stopped");
        tracing::error!(
            "Try: INMO_PORT={} cargo run -p inmo-app",
            config.general.port.saturating_add(1)
        );
        return Err(e.into());
    }

    Ok(())
}
