//! hoist server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use hoist_core::AppConfig;
use hoist_server::events::{EventBus, LogListener};
use hoist_server::{AppState, create_router};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// hoist - a resumable upload server
#[derive(Parser, Debug)]
#[command(name = "hoistd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "HOIST_CONFIG",
        default_value = "config/hoistd.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("hoist v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override
    // everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    if config_path.exists() {
        tracing::info!(config_path = %args.config, "loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("no config file found at {}", args.config);
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("HOIST_").split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    hoist_server::metrics::register_metrics();

    // Initialize the metadata store and verify it before accepting
    // requests.
    let metadata = hoist_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("metadata store initialized");

    // The default target factory writes into a single directory; make
    // sure it exists before the first create.
    tokio::fs::create_dir_all(&config.upload.directory)
        .await
        .context("failed to create upload directory")?;

    let mut events = EventBus::new();
    events.subscribe(Arc::new(LogListener));

    let bind = config.server.bind.clone();
    let state = AppState::with_defaults(config, metadata, events)?;
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %bind, "listening");

    axum::serve(listener, router).await.context("server error")?;

    Ok(())
}
