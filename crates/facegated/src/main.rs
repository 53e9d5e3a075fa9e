use anyhow::{Context, Result};
use facegate_core::{ModelPaths, OnnxEngine};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod routes;
mod upload;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter())),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), debug = config.debug, "facegated starting");

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload directory {}", config.upload_dir.display()))?;

    let models = ModelPaths::in_dir(&config.model_dir);
    let onnx = OnnxEngine::load(&models, config.intra_threads).context("loading face models")?;
    let engine = engine::spawn_engine(onnx).context("spawning engine thread")?;

    let addr = config.bind_addr();
    let app = routes::router(routes::AppState {
        engine,
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "facegated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("facegated shutting down"),
                Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c, shutting down"),
            }
        })
        .await?;

    Ok(())
}
