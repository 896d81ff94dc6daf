//! Titanic Survival Prediction Server
//!
//! Serves `POST /predict`, `POST /load`, `GET /history` and `GET /health`
//! over HTTP. The classifier and encoding pipeline artifacts are loaded at
//! startup; a missing classifier leaves the server running unloaded until one
//! is uploaded.

use titanic_server::config::{config_path, load_service_config};
use titanic_server::logging::init_tracing;
use titanic_server::{build_app_state, build_router, shutdown_signal, ShutdownCoordinator};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_path();
    let config = load_service_config(config_path.as_deref())?;
    init_tracing(&config.logging)?;

    match &config_path {
        Some(path) => info!(path = %path.display(), "Loaded configuration from file"),
        None => info!("No config file specified, using defaults"),
    }

    info!(
        listen_addr = %config.listen_addr,
        model_path = %config.model_path.display(),
        pipeline_path = %config.pipeline_path.display(),
        "Starting Titanic prediction server"
    );

    let listen_addr = config.listen_addr.clone();
    let coordinator = ShutdownCoordinator::new(config.shutdown.timeout_seconds);

    let state = build_app_state(config).await;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!(%listen_addr, "Prediction server listening");

    let signal = shutdown_signal(coordinator.clone());
    let server = async {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
        {
            tracing::error!(error = %e, "Server error");
        }
    };
    coordinator.drain(server).await;

    info!("Prediction server stopped");
    Ok(())
}
