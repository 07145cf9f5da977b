use std::sync::Arc;

use control_bus::{Bus, BusConfig, InMemoryTransport};
use control_shared::domain::PlatformKind;
use control_worker::config::{PlatformKindConfig, WorkerConfig};
use control_worker::container_driver::ContainerDriver;
use control_worker::health_monitor::{run_container_health_loop, run_pod_health_loop, run_process_health_loop};
use control_worker::pod_driver::PodDriver;
use control_worker::process_driver::{ProcessDriver, ProcessDriverConfig};
use control_worker::{CommandConsumer, PlatformDriver};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    control_shared::logging::init_tracing();
    let _ = dotenvy::dotenv();

    let config = WorkerConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "falling back to default worker configuration");
        WorkerConfig::default()
    });

    info!(?config.platform, version = env!("CARGO_PKG_VERSION"), "starting control-worker");

    // NOTE: the in-memory transport is a single-process stand-in; a real
    // deployment constructs the bus from whichever transport
    // `BusConfig::transport` names.
    let bus_config = BusConfig::load().unwrap_or_default();
    let bus = Arc::new(Bus::new(Arc::new(match bus_config.transport {
        control_bus::config::TransportKind::InMemory => InMemoryTransport::new(),
    })));
    let cancel = CancellationToken::new();

    let platform_kind: PlatformKind = config.platform.into();
    let (driver, channel): (Arc<dyn PlatformDriver>, &'static str) = match config.platform {
        PlatformKindConfig::Process => {
            let process_driver = Arc::new(ProcessDriver::new(ProcessDriverConfig {
                executable: config.executable.clone(),
                config_dir: config.config_dir.clone(),
                shutdown_timeout: config.shutdown_timeout(),
            }));
            tokio::spawn(run_process_health_loop(bus.clone(), process_driver.clone(), cancel.clone()));
            (process_driver, control_bus::CHANNEL_INSTANCE_COMMANDS_PROCESS)
        }
        PlatformKindConfig::Container => {
            let container_driver = Arc::new(ContainerDriver::new());
            tokio::spawn(run_container_health_loop(bus.clone(), container_driver.clone(), cancel.clone()));
            (container_driver, control_bus::CHANNEL_INSTANCE_COMMANDS_CONTAINER)
        }
        PlatformKindConfig::Pod => {
            let pod_driver = Arc::new(PodDriver::new());
            tokio::spawn(run_pod_health_loop(bus.clone(), pod_driver.clone(), cancel.clone()));
            (pod_driver, control_bus::CHANNEL_INSTANCE_COMMANDS_POD)
        }
    };
    info!(channel, ?platform_kind, "platform driver ready");

    let consumer = CommandConsumer::new(bus.clone(), driver, channel);
    consumer.run().await?;

    shutdown_signal().await;
    info!("shutdown signal received, cancelling background loops");
    cancel.cancel();

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
