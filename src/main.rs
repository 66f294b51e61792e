use anyhow::Context;
use clap::Parser;
use codepath::{
    api,
    cli::Cli,
    db,
    utils::config::{Config, LogFormat},
    AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.server.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Drops expired rate-limit counters so idle clients don't accumulate.
fn spawn_rate_limit_purge(state: &AppState) {
    let limiter = state.rate_limiter.clone();
    let every = Duration::from_secs(state.config.server.rate_limit_purge_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            match limiter.purge().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Purged expired rate-limit windows"),
                Err(e) => tracing::warn!(error = %e, "Rate-limit purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path();
    let mut config =
        Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_tracing(&config);
    match &config_path {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("No config file, using defaults and environment"),
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config)
        .await
        .context("Failed to initialize application state")?;

    db::ensure_first_admin(&state.db, &state.auth_service, &state.config.admin)
        .await
        .context("Failed to seed first admin")?;

    spawn_rate_limit_purge(&state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(
        address = %addr,
        prefix = %state.config.server.api_prefix,
        "CodePath server listening"
    );

    axum::serve(
        listener,
        api::app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}
