use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use control_shared::domain::{DeclaredConfiguration, PlatformHandle, RuntimeInfo, ServerBinding};
use control_shared::{ControlError, ControlResult};
use dashmap::DashMap;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::driver::PlatformDriver;
use crate::port_allocator::PortAllocator;

/// Configuration for the bare-process backend.
#[derive(Debug, Clone)]
pub struct ProcessDriverConfig {
    pub executable: PathBuf,
    pub config_dir: PathBuf,
    pub shutdown_timeout: Duration,
}

impl Default for ProcessDriverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("managed-server"),
            config_dir: PathBuf::from("./run"),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Drives a managed server as a bare OS process: materializes the declared
/// configuration to `{configDir}/{id}-config.yaml`, launches
/// `{executable} --config {file}`, and tracks the child for health checks
/// and termination.
#[derive(Debug)]
pub struct ProcessDriver {
    config: ProcessDriverConfig,
    children: DashMap<String, Child>,
}

impl ProcessDriver {
    pub fn new(config: ProcessDriverConfig) -> Self {
        Self {
            config,
            children: DashMap::new(),
        }
    }

    fn config_path(&self, instance_id: &str) -> PathBuf {
        self.config.config_dir.join(format!("{instance_id}-config.yaml"))
    }

    async fn spawn_with_retry(&self, instance_id: &str, config_path: &PathBuf) -> ControlResult<Child> {
        const MAX_ATTEMPTS: u32 = 3;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut command = Command::new(&self.config.executable);
            command.arg("--config").arg(config_path);
            command.kill_on_drop(true);

            match command.spawn() {
                Ok(child) => return Ok(child),
                Err(e) if is_transient_spawn_error(&e) && attempt < MAX_ATTEMPTS => {
                    let backoff = Duration::from_millis(50 * 2u64.pow(attempt));
                    warn!(instance_id, attempt, error = %e, "transient spawn failure, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(ControlError::PlatformFailure(format!(
                        "failed to spawn {}: {e}",
                        self.config.executable.display()
                    )));
                }
            }
        }
    }
}

fn is_transient_spawn_error(error: &std::io::Error) -> bool {
    matches!(error.raw_os_error(), Some(26) | Some(11))
}

#[async_trait]
impl PlatformDriver for ProcessDriver {
    async fn start(&self, instance_id: &str, config: &DeclaredConfiguration) -> ControlResult<RuntimeInfo> {
        tokio::fs::create_dir_all(&self.config.config_dir)
            .await
            .map_err(|e| ControlError::PlatformFailure(format!("create config dir failed: {e}")))?;

        let yaml = config
            .to_yaml()
            .map_err(|e| ControlError::Validation(format!("config serialization failed: {e}")))?;
        let config_path = self.config_path(instance_id);
        tokio::fs::write(&config_path, yaml)
            .await
            .map_err(|e| ControlError::PlatformFailure(format!("write config failed: {e}")))?;

        let child = self.spawn_with_retry(instance_id, &config_path).await?;
        let pid = child.id().ok_or_else(|| {
            ControlError::PlatformFailure("spawned child has no pid".to_string())
        })?;
        self.children.insert(instance_id.to_string(), child);

        info!(instance_id, pid, "process started");
        Ok(RuntimeInfo::started(instance_id, PlatformHandle::ProcessId(pid)))
    }

    async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
        let Some((_, mut child)) = self.children.remove(instance_id) else {
            // Idempotent: stopping an instance we never tracked is not an error.
            return Ok(RuntimeInfo::stopped(instance_id));
        };

        // Graceful: close stdin and give the process a chance to exit on its
        // own before escalating to a forced kill.
        drop(child.stdin.take());
        match timeout(self.config.shutdown_timeout, child.wait()).await {
            Ok(Ok(_)) => info!(instance_id, "process exited gracefully"),
            Ok(Err(e)) => warn!(instance_id, error = %e, "error waiting on process"),
            Err(_) => {
                warn!(instance_id, "graceful shutdown timed out, forcing kill");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        Ok(RuntimeInfo::stopped(instance_id))
    }

    async fn restart(&self, instance_id: &str, config: Option<&DeclaredConfiguration>) -> ControlResult<RuntimeInfo> {
        let stopped = self.stop(instance_id).await?;
        tokio::time::sleep(Duration::from_secs(2)).await;
        match config {
            Some(cfg) => self.start(instance_id, cfg).await,
            None => {
                warn!(instance_id, "restart requested without configuration; treating as stop-only");
                Ok(stopped)
            }
        }
    }

    async fn status(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
        if let Some(mut entry) = self.children.get_mut(instance_id) {
            let pid = entry.id().ok_or_else(|| {
                ControlError::PlatformFailure("tracked child has no pid".to_string())
            })?;
            return Ok(RuntimeInfo::started(instance_id, PlatformHandle::ProcessId(pid)));
        }
        Err(ControlError::NotFound(instance_id.to_string()))
    }

    async fn list_all(&self) -> ControlResult<Vec<RuntimeInfo>> {
        let mut infos = Vec::new();
        for entry in self.children.iter() {
            if let Some(pid) = entry.value().id() {
                infos.push(RuntimeInfo::started(entry.key().clone(), PlatformHandle::ProcessId(pid)));
            }
        }
        Ok(infos)
    }

    async fn available(&self) -> bool {
        tokio::fs::metadata(&self.config.executable).await.is_ok()
            || which_on_path(&self.config.executable)
    }

    async fn allocate(&self, allocator: &PortAllocator) -> ControlResult<ServerBinding> {
        let port = allocator.allocate()?;
        Ok(ServerBinding {
            host: "127.0.0.1".to_string(),
            port,
            log_level: "info".to_string(),
        })
    }
}

fn which_on_path(executable: &PathBuf) -> bool {
    if executable.is_absolute() {
        return false;
    }
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| dir.join(executable).exists())
        })
        .unwrap_or(false)
}

/// Reaps children that have exited on their own, returning the instance ids
/// that transitioned out of the tracked map along with their exit status.
/// Called by the health monitor loop.
pub async fn reap_exited(driver: &ProcessDriver) -> Vec<(String, Option<i32>)> {
    let mut exited = Vec::new();
    let instance_ids: Vec<String> = driver.children.iter().map(|e| e.key().clone()).collect();
    for instance_id in instance_ids {
        let should_remove = {
            if let Some(mut entry) = driver.children.get_mut(&instance_id) {
                matches!(entry.value_mut().try_wait(), Ok(Some(_)))
            } else {
                false
            }
        };
        if should_remove {
            if let Some((_, mut child)) = driver.children.remove(&instance_id) {
                let code = child.try_wait().ok().flatten().and_then(|s| s.code());
                exited.push((instance_id, code));
            }
        }
    }
    exited
}
