use std::sync::Arc;

use control_api::config::ApiConfig;
use control_api::http::router;
use control_api::InstanceService;
use control_bus::{Bus, BusConfig, InMemoryTransport};
use control_shared::domain::StatusRing;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    control_shared::logging::init_tracing();
    let _ = dotenvy::dotenv();

    let config = ApiConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default API configuration");
        ApiConfig::default()
    });

    info!(version = env!("CARGO_PKG_VERSION"), bind_address = %config.bind_address, "starting control-api");

    let bus_config = BusConfig::load().unwrap_or_default();
    let bus = Arc::new(Bus::new(Arc::new(match bus_config.transport {
        control_bus::config::TransportKind::InMemory => InMemoryTransport::new(),
    })));
    let status_ring = Arc::new(StatusRing::new());
    let service = Arc::new(InstanceService::new(bus, status_ring));

    let app = router(service);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
