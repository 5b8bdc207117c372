//! river - personal audio library server
//!
//! Startup order: arguments, config file, logging, settings, external tools,
//! password, library (snapshot + initial reload), then the listener.

use anyhow::{Context, Result};
use clap::Parser;
use river_common::api::auth::load_password;
use river_common::config::load_toml_config;
use river_server::config::{Args, ServerSettings};
use river_server::services::Library;
use river_server::{build_router, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting river v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let settings = ServerSettings::resolve(&args, &toml)?;
    let library_settings = settings
        .library_settings()
        .context("Required external tool not available")?;
    info!("Library root: {}", settings.library_root.display());
    info!("Data directory: {}", settings.data_dir.display());
    info!("Probe tool: {}", library_settings.probe_tool.display());
    info!("Transcode tool: {}", library_settings.transcode_tool.display());

    let password = load_password(&settings.password_file)?;
    if password.is_empty() {
        warn!(
            "Password file {} is empty; authentication disabled",
            settings.password_file.display()
        );
    }

    let library = Library::open(library_settings)
        .await
        .context("Failed to open library")?;
    let summary = library.reload().await.context("Initial library scan failed")?;
    info!(
        "✓ Indexed {} tracks ({} added, {} updated, {} removed)",
        summary.tracks, summary.stats.added, summary.stats.updated, summary.stats.removed
    );

    let state = AppState::new(Arc::new(library), &password);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.listen))?;
    info!("river listening on http://{}", settings.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
