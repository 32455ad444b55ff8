//! Locus server binary: CLI parsing, tracing setup, graceful shutdown.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use locus_server::ServerSettings;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Real-time location sharing server.
///
/// Serves the map page and relays every connected client's position to
/// all other clients over WebSockets.
#[derive(Debug, Parser)]
#[command(name = "locus", version, about)]
struct Cli {
    /// Path to a JSON settings file.
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Interface to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// TCP port to listen on (overrides settings).
    #[arg(long, short)]
    port: Option<u16>,

    /// Directory holding the map page and client assets (overrides settings).
    #[arg(long, value_name = "DIR")]
    assets_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings =
        ServerSettings::load(cli.settings.as_deref()).context("loading settings")?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(assets_dir) = cli.assets_dir {
        settings.assets_dir = assets_dir;
    }

    locus_server::serve(settings, shutdown_signal()).await?;
    info!("server stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
