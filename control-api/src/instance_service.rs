use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use control_bus::Bus;
use control_shared::domain::{
    Command, CommandKind, DeclaredConfiguration, Event, Instance, InstanceStatus, PlatformKind,
    Response, RuntimeInfo, ServerBinding, StatusChangeRecord, StatusRing,
};
use control_shared::patch::{apply_patch, PatchOp};
use control_shared::{ControlError, ControlResult};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Commands block callers for up to this long before surfacing a timeout.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns declarative instance metadata and declared configuration,
/// translates user intent into bus commands, and exposes the status ring.
///
/// Metadata and declared configuration are exclusively owned here; runtime
/// info is co-owned with workers, which write it via command responses.
#[derive(Debug)]
pub struct InstanceService {
    bus: Arc<Bus>,
    instances: DashMap<String, Instance>,
    configurations: DashMap<String, DeclaredConfiguration>,
    runtime: DashMap<String, RuntimeInfo>,
    status_ring: Arc<StatusRing>,
    command_timeout: Duration,
}

impl InstanceService {
    pub fn new(bus: Arc<Bus>, status_ring: Arc<StatusRing>) -> Self {
        Self::with_command_timeout(bus, status_ring, COMMAND_TIMEOUT)
    }

    pub fn with_command_timeout(bus: Arc<Bus>, status_ring: Arc<StatusRing>, command_timeout: Duration) -> Self {
        Self {
            bus,
            instances: DashMap::new(),
            configurations: DashMap::new(),
            runtime: DashMap::new(),
            status_ring,
            command_timeout,
        }
    }

    pub fn create_instance(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        platform_kind: PlatformKind,
        initial_binding: Option<ServerBinding>,
    ) -> Instance {
        let mut instance = Instance::new(name, platform_kind);
        instance.description = description;
        self.configurations.insert(
            instance.id.clone(),
            DeclaredConfiguration::new(initial_binding.unwrap_or_default()),
        );
        self.instances.insert(instance.id.clone(), instance.clone());
        instance
    }

    pub fn get_instance(&self, id: &str) -> ControlResult<Instance> {
        self.instances
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| ControlError::NotFound(id.to_string()))
    }

    pub fn list_instances(&self) -> Vec<Instance> {
        self.instances.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_configuration(&self, id: &str) -> ControlResult<DeclaredConfiguration> {
        self.configurations
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| ControlError::NotFound(id.to_string()))
    }

    /// Applies an RFC-6902-like patch to the declared configuration,
    /// persisting the result iff it parses and applies cleanly, then marks
    /// the instance `ConfigurationChanged` so the reconciler picks it up.
    pub async fn patch_configuration(&self, id: &str, ops: &[PatchOp]) -> ControlResult<DeclaredConfiguration> {
        let current = self.get_configuration(id)?;
        let current_value = serde_json::to_value(&current)
            .map_err(|e| ControlError::Validation(format!("serialize failed: {e}")))?;
        let patched_value = apply_patch(&current_value, ops)?;
        let patched: DeclaredConfiguration = serde_json::from_value(patched_value)
            .map_err(|e| ControlError::Validation(format!("patched document is invalid: {e}")))?;

        self.configurations.insert(id.to_string(), patched.clone());
        self.mark_configuration_changed(id).await?;
        Ok(patched)
    }

    async fn mark_configuration_changed(&self, id: &str) -> ControlResult<()> {
        let mut instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| ControlError::NotFound(id.to_string()))?;
        let old = instance.status;
        instance.set_status(InstanceStatus::ConfigurationChanged);
        drop(instance);

        self.record_status_change(id, old, InstanceStatus::ConfigurationChanged, "api", Default::default())
            .await;
        Ok(())
    }

    pub async fn start_instance(&self, id: &str, config: Option<DeclaredConfiguration>) -> ControlResult<RuntimeInfo> {
        let configuration = match config {
            Some(c) => c,
            None => self.get_configuration(id)?,
        };
        self.dispatch(id, CommandKind::Start, Some(configuration)).await
    }

    pub async fn stop_instance(&self, id: &str) -> ControlResult<RuntimeInfo> {
        self.dispatch(id, CommandKind::Stop, None).await
    }

    pub async fn restart_instance(&self, id: &str) -> ControlResult<RuntimeInfo> {
        let configuration = self.get_configuration(id).ok();
        self.dispatch(id, CommandKind::Restart, configuration).await
    }

    pub async fn delete_instance(&self, id: &str) -> ControlResult<()> {
        self.dispatch(id, CommandKind::Delete, None).await?;
        self.instances.remove(id);
        self.configurations.remove(id);
        self.runtime.remove(id);
        Ok(())
    }

    async fn dispatch(
        &self,
        id: &str,
        kind: CommandKind,
        configuration: Option<DeclaredConfiguration>,
    ) -> ControlResult<RuntimeInfo> {
        let instance = self.get_instance(id)?;
        let channel = instance.platform_kind.command_channel();

        let mut command = Command::new(kind, id);
        if let Some(config) = configuration {
            command = command.with_configuration(config);
        }

        let response: Response = self.bus.request(channel, command, self.command_timeout).await?;
        if !response.success {
            return Err(ControlError::PlatformFailure(
                response.error_message.unwrap_or_else(|| "command failed".to_string()),
            ));
        }
        let runtime_info = response
            .runtime_info
            .ok_or_else(|| ControlError::PlatformFailure("worker reported success with no runtime info".to_string()))?;

        let new_status = runtime_info.status;
        self.runtime.insert(id.to_string(), runtime_info.clone());
        if let Some(mut instance) = self.instances.get_mut(id) {
            let old = instance.status;
            instance.set_status(new_status);
            drop(instance);
            self.record_status_change(id, old, new_status, "api", Default::default()).await;
        }

        Ok(runtime_info)
    }

    /// Ingress for externally-observed status (out-of-band daemons). Purely
    /// informational: never publishes a command to the worker.
    pub async fn receive_status_update(
        &self,
        instance_id: &str,
        new_status: InstanceStatus,
        source: impl Into<String>,
        metadata: std::collections::HashMap<String, String>,
    ) -> ControlResult<()> {
        let mut instance = self
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| ControlError::NotFound(instance_id.to_string()))?;
        let old = instance.status;
        if old == new_status {
            return Ok(());
        }
        instance.set_status(new_status);
        drop(instance);

        if let Some(mut runtime) = self.runtime.get_mut(instance_id) {
            runtime.status = new_status;
            runtime.metadata.extend(metadata.clone());
        }

        self.record_status_change(instance_id, old, new_status, source, metadata).await;
        Ok(())
    }

    async fn record_status_change(
        &self,
        instance_id: &str,
        old: InstanceStatus,
        new: InstanceStatus,
        source: impl Into<String>,
        metadata: std::collections::HashMap<String, String>,
    ) {
        let source = source.into();
        self.status_ring.push(StatusChangeRecord {
            instance_id: instance_id.to_string(),
            old_status: old,
            new_status: new,
            source: source.clone(),
            timestamp: Utc::now(),
            metadata,
        });

        let event = Event::InstanceStatusChanged {
            instance_id: instance_id.to_string(),
            correlation_id: Uuid::new_v4(),
            old,
            new,
            source,
        };
        if let Err(e) = self.bus.publish(control_bus::CHANNEL_STATUS_EVENTS, &event).await {
            info!(error = %e, "failed to broadcast status change");
        }
    }

    pub fn get_recent_changes(&self, since: DateTime<Utc>, status_filter: Option<InstanceStatus>) -> Vec<StatusChangeRecord> {
        self.status_ring.recent_changes(since, status_filter)
    }
}
