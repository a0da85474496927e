use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use convertino_core::{load_config, validate_config, ConversionContext};
use convertino_server::api::create_router;
use convertino_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("CONVERTINO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Settings path: {:?}", config.settings.path);
    info!("FFmpeg binary: {:?}", config.engine.ffmpeg_path);

    let context = ConversionContext::from_config(&config)
        .await
        .context("Failed to initialize conversion context")?;
    info!(
        "Conversion context ready (engine: {}, max concurrency: {})",
        context.engine_name(),
        context.settings().max_concurrency
    );

    let engine = context.engine_status();
    if !engine.ready {
        warn!(
            "FFmpeg is not usable ({}); conversions will fail until it is installed",
            engine.error.as_deref().unwrap_or("unknown error")
        );
    }

    register_startup_files(&context, std::env::args().skip(1)).await;

    let state = Arc::new(AppState::new(config.clone(), context));
    let app = create_router(Arc::clone(&state));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    state.context().shutdown().await;
    info!("Orchestrator stopped");

    Ok(())
}

/// Register files passed on the command line ("open with").
async fn register_startup_files(
    context: &ConversionContext,
    paths: impl Iterator<Item = String>,
) {
    for path in paths {
        match context.register_file(&path).await {
            Ok(entry) => info!(
                "Registered {} from the command line as file {}",
                path, entry.id
            ),
            Err(e) => warn!("Could not register {} from the command line: {}", path, e),
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
