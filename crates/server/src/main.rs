//! Depot server binary.

use anyhow::{Context, Result};
use clap::Parser;
use depot_core::config::AppConfig;
use depot_server::bootstrap::{build_state, report_orphans};
use depot_server::create_router;
use depot_signer::KeyManagerRegistry;
use depot_storage::StorageRegistry;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Depot - signed appliance distribution server
#[derive(Parser, Debug)]
#[command(name = "depotd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "DEPOT_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load the configuration file (optional) merged with `DEPOT_` variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }

    figment
        .merge(Env::prefixed("DEPOT_").split("__"))
        .extract()
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Depot v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    let bind = config.server.bind.clone();

    // Registries are filled here, before anything is opened.
    let storage = StorageRegistry::with_defaults();
    let key_managers = KeyManagerRegistry::with_defaults();
    tracing::info!(
        storage = ?storage.names(),
        key_managers = ?key_managers.modes(),
        "Registered providers"
    );

    let state = build_state(config, &storage, &key_managers).await?;
    if let Err(e) = report_orphans(&state).await {
        tracing::warn!(error = %e, "Startup audit failed");
    }
    let app = create_router(state);

    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address: {bind}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app).await?;

    Ok(())
}
