use std::path::PathBuf;
use std::time::Duration;

use control_shared::domain::PlatformKind;
use serde::Deserialize;

/// Layered worker configuration (defaults + TOML file + environment
/// overrides, following the same `config` crate pattern used workspace
/// wide).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub platform: PlatformKindConfig,
    pub executable: PathBuf,
    pub config_dir: PathBuf,
    pub shutdown_timeout_ms: u64,
    pub port_pool_start: u16,
    pub port_pool_end: u16,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKindConfig {
    Process,
    Container,
    Pod,
}

impl From<PlatformKindConfig> for PlatformKind {
    fn from(value: PlatformKindConfig) -> Self {
        match value {
            PlatformKindConfig::Process => PlatformKind::Process,
            PlatformKindConfig::Container => PlatformKind::Container,
            PlatformKindConfig::Pod => PlatformKind::Pod,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKindConfig::Process,
            executable: PathBuf::from("managed-server"),
            config_dir: PathBuf::from("./run"),
            shutdown_timeout_ms: 10_000,
            port_pool_start: crate::port_allocator::DEFAULT_POOL_START,
            port_pool_end: crate::port_allocator::DEFAULT_POOL_END,
        }
    }
}

impl WorkerConfig {
    /// Loads configuration layering a TOML file (if present) over defaults,
    /// then `CONTROL_WORKER_*` environment variables over that.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("control-worker").required(false))
            .add_source(config::Environment::with_prefix("CONTROL_WORKER").separator("__"))
            .build()?;
        settings.try_deserialize()
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.platform, PlatformKindConfig::Process);
        assert_eq!(cfg.port_pool_start, 8080);
    }
}
