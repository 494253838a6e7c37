// Prediction server entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr)
// 2. Load config (config/predictor.toml, optional)
// 3. Attempt to load the model artifact once; a missing model is not fatal
// 4. Serve HTTP until Ctrl+C

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rookie_core::config;
use rookie_server::routes;
use rookie_server::service::PredictionService;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Rookie predictor starting up");

    let config = config::load_config().context("failed to load configuration")?;

    let service = Arc::new(PredictionService::load(Path::new(&config.paths.model)));
    info!(
        "Model loaded: {} ({})",
        service.health().model_loaded,
        service.model_path().display()
    );

    let app = routes::router(service);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Rookie predictor shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("rookie_core=info,rookie_server=info,tower_http=info,warn")
        }))
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
