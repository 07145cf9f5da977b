use async_trait::async_trait;
use control_shared::domain::{DeclaredConfiguration, PlatformHandle, RuntimeInfo, ServerBinding};
use control_shared::{ControlError, ControlResult};
use dashmap::DashMap;
use tracing::info;

use crate::driver::PlatformDriver;
use crate::port_allocator::PortAllocator;

/// Drives a managed server hosted as a container.
///
/// The container runtime itself is an opaque external collaborator per the
/// system's scope; this implementation models the state machine and the
/// event surface without shelling out to a real container API, standing in
/// for whatever client (Docker Engine API, containerd) a deployment plugs
/// in.
#[derive(Debug, Default)]
pub struct ContainerDriver {
    running: DashMap<String, String>,
}

impl ContainerDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlatformDriver for ContainerDriver {
    async fn start(&self, instance_id: &str, _config: &DeclaredConfiguration) -> ControlResult<RuntimeInfo> {
        let container_id = format!("container-{instance_id}");
        self.running.insert(instance_id.to_string(), container_id.clone());
        info!(instance_id, container_id, "container started");
        Ok(RuntimeInfo::started(instance_id, PlatformHandle::ContainerId(container_id)))
    }

    async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
        self.running.remove(instance_id);
        Ok(RuntimeInfo::stopped(instance_id))
    }

    async fn restart(&self, instance_id: &str, config: Option<&DeclaredConfiguration>) -> ControlResult<RuntimeInfo> {
        let stopped = self.stop(instance_id).await?;
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        match config {
            Some(cfg) => self.start(instance_id, cfg).await,
            None => Ok(stopped),
        }
    }

    async fn status(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
        self.running
            .get(instance_id)
            .map(|id| RuntimeInfo::started(instance_id, PlatformHandle::ContainerId(id.clone())))
            .ok_or_else(|| ControlError::NotFound(instance_id.to_string()))
    }

    async fn list_all(&self) -> ControlResult<Vec<RuntimeInfo>> {
        Ok(self
            .running
            .iter()
            .map(|e| RuntimeInfo::started(e.key().clone(), PlatformHandle::ContainerId(e.value().clone())))
            .collect())
    }

    async fn available(&self) -> bool {
        true
    }

    async fn allocate(&self, allocator: &PortAllocator) -> ControlResult<ServerBinding> {
        let port = allocator.allocate()?;
        Ok(ServerBinding {
            host: "0.0.0.0".to_string(),
            port,
            log_level: "info".to_string(),
        })
    }
}
