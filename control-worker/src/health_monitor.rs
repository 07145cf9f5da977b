use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use control_bus::Bus;
use control_shared::domain::{Event, InstanceStatus};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::container_driver::ContainerDriver;
use crate::driver::PlatformDriver;
use crate::pod_driver::PodDriver;
use crate::process_driver::{reap_exited, ProcessDriver};

pub const PROCESS_HEALTH_INTERVAL: Duration = Duration::from_secs(10);
pub const CONTAINER_HEALTH_INTERVAL: Duration = Duration::from_secs(15);

/// Periodically reaps exited processes, emitting a status change into the
/// broadcast channel for each one and dropping it from the tracked map.
pub async fn run_process_health_loop(bus: Arc<Bus>, driver: Arc<ProcessDriver>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(PROCESS_HEALTH_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("process health monitor shutting down");
                return;
            }
            _ = interval.tick() => {
                for (instance_id, exit_code) in reap_exited(&driver).await {
                    let mut metadata = HashMap::new();
                    if let Some(code) = exit_code {
                        metadata.insert("ExitCode".to_string(), code.to_string());
                    }
                    metadata.insert("Reason".to_string(), "process exited".to_string());

                    let event = Event::InstanceStatusChanged {
                        instance_id: instance_id.clone(),
                        correlation_id: uuid::Uuid::new_v4(),
                        old: InstanceStatus::Running,
                        new: InstanceStatus::Error,
                        source: "health-monitor".to_string(),
                    };
                    if let Err(e) = bus.publish(control_bus::CHANNEL_STATUS_EVENTS, &event).await {
                        tracing::error!(instance_id, error = %e, "failed to publish health status event");
                    }
                }
            }
        }
    }
}

/// Periodically checks a simulated backend's availability; when the backend
/// reports unavailable, every instance it was tracking is marked `Error` and
/// a status change is published for each. Container and pod drivers have no
/// exit-code concept of their own (unlike [`ProcessDriver`]), so unavailable
/// backend is the only signal they can surface.
pub async fn run_container_health_loop(bus: Arc<Bus>, driver: Arc<ContainerDriver>, cancel: CancellationToken) {
    run_backend_availability_loop(bus, driver, cancel, CONTAINER_HEALTH_INTERVAL, "container").await;
}

pub async fn run_pod_health_loop(bus: Arc<Bus>, driver: Arc<PodDriver>, cancel: CancellationToken) {
    run_backend_availability_loop(bus, driver, cancel, CONTAINER_HEALTH_INTERVAL, "pod").await;
}

async fn run_backend_availability_loop<D: PlatformDriver + ?Sized>(
    bus: Arc<Bus>,
    driver: Arc<D>,
    cancel: CancellationToken,
    period: Duration,
    label: &'static str,
) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(label, "health monitor shutting down");
                return;
            }
            _ = interval.tick() => {
                if driver.available().await {
                    continue;
                }
                warn_backend_unavailable(label);
                let Ok(tracked) = driver.list_all().await else { continue };
                for runtime_info in tracked {
                    let event = Event::InstanceStatusChanged {
                        instance_id: runtime_info.instance_id.clone(),
                        correlation_id: uuid::Uuid::new_v4(),
                        old: InstanceStatus::Running,
                        new: InstanceStatus::Error,
                        source: "health-monitor".to_string(),
                    };
                    if let Err(e) = bus.publish(control_bus::CHANNEL_STATUS_EVENTS, &event).await {
                        tracing::error!(instance_id = %runtime_info.instance_id, error = %e, "failed to publish health status event");
                    }
                }
            }
        }
    }
}

fn warn_backend_unavailable(label: &'static str) {
    tracing::warn!(label, "platform backend reported unavailable");
}
