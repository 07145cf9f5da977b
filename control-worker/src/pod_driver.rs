use async_trait::async_trait;
use control_shared::domain::{DeclaredConfiguration, PlatformHandle, RuntimeInfo, ServerBinding};
use control_shared::{ControlError, ControlResult};
use dashmap::DashMap;
use tracing::info;

use crate::driver::PlatformDriver;
use crate::port_allocator::PortAllocator;

/// Drives a managed server hosted as a container-orchestrator pod.
///
/// Same standing-in-for-an-external-API posture as [`ContainerDriver`];
/// models the pod-name/namespace handle and lifecycle without a real
/// orchestrator client.
#[derive(Debug, Default)]
pub struct PodDriver {
    running: DashMap<String, (String, String)>,
}

impl PodDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlatformDriver for PodDriver {
    async fn start(&self, instance_id: &str, _config: &DeclaredConfiguration) -> ControlResult<RuntimeInfo> {
        let name = format!("pod-{instance_id}");
        let namespace = "default".to_string();
        self.running
            .insert(instance_id.to_string(), (name.clone(), namespace.clone()));
        info!(instance_id, pod = %name, "pod started");
        Ok(RuntimeInfo::started(
            instance_id,
            PlatformHandle::Pod { name, namespace },
        ))
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
            .map(|entry| {
                let (name, namespace) = entry.value().clone();
                RuntimeInfo::started(instance_id, PlatformHandle::Pod { name, namespace })
            })
            .ok_or_else(|| ControlError::NotFound(instance_id.to_string()))
    }

    async fn list_all(&self) -> ControlResult<Vec<RuntimeInfo>> {
        Ok(self
            .running
            .iter()
            .map(|e| {
                let (name, namespace) = e.value().clone();
                RuntimeInfo::started(e.key().clone(), PlatformHandle::Pod { name, namespace })
            })
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
