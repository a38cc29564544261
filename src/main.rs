use emodiary::{app, initialize_state, telemetry};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut state = initialize_state().await?;
    match telemetry::setup_metrics_recorder() {
        Ok(handle) => state.metrics = Some(handle),
        Err(err) => tracing::error!(%err, "prometheus recorder not installed"),
    }

    let listener = TcpListener::bind(&state.config.address).await?;
    tracing::info!(address = %listener.local_addr()?, "server started");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
