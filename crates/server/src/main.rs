//! lode registry server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use lode_core::config::AppConfig;
use lode_server::hooks::{HookQueue, hooks_from_config, spawn_hook_worker};
use lode_server::{AppState, create_router};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// lode - A package registry server
#[derive(Parser, Debug)]
#[command(name = "loded")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "LODE_CONFIG", default_value = "config/server.toml")]
    config: String,
}

/// Merge the optional config file with `LODE_` environment variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // LODE_CONFIG only names the file; it is not configuration itself.
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("LODE_") && key != "LODE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: loded --config /path/to/config.toml\n  \
             2. Environment variables: LODE_SERVER__BIND=0.0.0.0:8000 \
             LODE_AUTH__JWT_SECRET=YOUR_SECRET_OF_32_BYTES_OR_MORE loded\n\n\
             See config/server.example.toml for example configuration.\n\
             Set LODE_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("LODE_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("lode v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    if config.auth.expose_verification_token {
        tracing::warn!(
            "auth.expose_verification_token is enabled; registration responses carry verification tokens"
        );
    }

    // Register Prometheus metrics
    lode_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let metadata = lode_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    let hooks = if config.hooks.enabled {
        let hooks = hooks_from_config(&config.hooks, metadata.clone());
        let names: Vec<&str> = hooks.iter().map(|h| h.name()).collect();
        let (queue, _worker) = spawn_hook_worker(hooks, config.hooks.queue_capacity);
        tracing::info!(
            hooks = ?names,
            capacity = config.hooks.queue_capacity,
            "Post-publish hook worker spawned"
        );
        queue
    } else {
        tracing::info!("Post-publish hooks disabled");
        HookQueue::disabled()
    };

    let state = AppState::new(config.clone(), metadata, hooks);
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
