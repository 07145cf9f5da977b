use std::sync::Arc;

use control_reconciler::config::ReconcilerConfig;
use control_reconciler::{HttpApiClient, Reconciler};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    control_shared::logging::init_tracing();
    let _ = dotenvy::dotenv();

    let config = ReconcilerConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default reconciler configuration");
        ReconcilerConfig::default()
    });

    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_base_url = %config.api_base_url,
        "starting control-reconciler"
    );

    let client = Arc::new(HttpApiClient::new(config.api_base_url.clone()));
    let reconciler = Arc::new(Reconciler::new(client, config));
    let cancel = CancellationToken::new();

    let periodic = tokio::spawn(reconciler.clone().run_periodic_loop(cancel.clone()));
    let event_driven = tokio::spawn(reconciler.clone().run_event_driven_loop(cancel.clone()));

    shutdown_signal().await;
    info!("shutdown signal received, cancelling reconciliation loops");
    cancel.cancel();

    let _ = tokio::join!(periodic, event_driven);
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
}
