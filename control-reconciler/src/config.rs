use serde::Deserialize;
use std::time::Duration;

/// Layered reconciler configuration (defaults + TOML file + environment
/// overrides), following the same `config` crate pattern used workspace
/// wide.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub api_base_url: String,
    pub polling_interval_ms: u64,
    pub event_poll_interval_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub reconciliation_timeout_ms: u64,
    pub concurrency: usize,
    pub reconcile_stopped_instances: bool,
    pub reconcile_error_instances: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            polling_interval_ms: 30_000,
            event_poll_interval_ms: 2_000,
            max_retries: 3,
            retry_delay_ms: 10_000,
            reconciliation_timeout_ms: 5 * 60 * 1000,
            concurrency: 5,
            reconcile_stopped_instances: false,
            reconcile_error_instances: true,
        }
    }
}

impl ReconcilerConfig {
    /// Loads configuration layering a TOML file (if present) over defaults,
    /// then `CONTROL_RECONCILER_*` environment variables over that.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("control-reconciler").required(false))
            .add_source(config::Environment::with_prefix("CONTROL_RECONCILER").separator("__"))
            .build()?;
        settings.try_deserialize()
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn event_poll_interval(&self) -> Duration {
        Duration::from_millis(self.event_poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn reconciliation_timeout(&self) -> Duration {
        Duration::from_millis(self.reconciliation_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let cfg = ReconcilerConfig::default();
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.retry_delay(), Duration::from_secs(10));
        assert_eq!(cfg.reconciliation_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.concurrency, 5);
        assert!(cfg.reconcile_error_instances);
        assert!(!cfg.reconcile_stopped_instances);
    }
}
