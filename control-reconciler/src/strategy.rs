use async_trait::async_trait;
use control_shared::domain::DeclaredConfiguration;
use control_shared::{ControlError, ControlResult};

use crate::api_client::ApiClient;

/// A way of bringing a drifted instance back in line with its desired
/// configuration. Only [`RestartStrategy`] is implemented; the rest name
/// strategies the reconciler's contract anticipates but does not yet drive.
#[async_trait]
pub trait ReconciliationStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    async fn apply(
        &self,
        client: &dyn ApiClient,
        instance_id: &str,
        desired: &DeclaredConfiguration,
    ) -> ControlResult<()>;
}

/// Stop the instance, pause briefly for the platform to release its
/// resources, then start it again with the desired configuration. Succeeds
/// only if both calls succeed.
#[derive(Debug, Default)]
pub struct RestartStrategy {
    pub settle_delay: std::time::Duration,
}

impl RestartStrategy {
    pub fn new() -> Self {
        Self {
            settle_delay: std::time::Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl ReconciliationStrategy for RestartStrategy {
    fn name(&self) -> &'static str {
        "restart"
    }

    async fn apply(
        &self,
        client: &dyn ApiClient,
        instance_id: &str,
        desired: &DeclaredConfiguration,
    ) -> ControlResult<()> {
        client.stop(instance_id).await?;
        tokio::time::sleep(self.settle_delay).await;
        client.start(instance_id, desired.clone()).await?;
        Ok(())
    }
}

macro_rules! unimplemented_strategy {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Default)]
        pub struct $name;

        #[async_trait]
        impl ReconciliationStrategy for $name {
            fn name(&self) -> &'static str {
                $label
            }

            async fn apply(
                &self,
                _client: &dyn ApiClient,
                _instance_id: &str,
                _desired: &DeclaredConfiguration,
            ) -> ControlResult<()> {
                Err(ControlError::Validation(format!("strategy '{}' is not implemented", $label)))
            }
        }
    };
}

unimplemented_strategy!(RollingUpdateStrategy, "rolling-update");
unimplemented_strategy!(BlueGreenStrategy, "blue-green");
unimplemented_strategy!(CanaryStrategy, "canary");
unimplemented_strategy!(ManualStrategy, "manual");

#[cfg(test)]
mod tests {
    use super::*;
    use control_shared::domain::{PlatformHandle, RuntimeInfo, ServerBinding};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct RecordingClient {
        stop_calls: AtomicUsize,
        start_calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiClient for RecordingClient {
        async fn list_instances(&self) -> ControlResult<Vec<control_shared::domain::Instance>> {
            Ok(vec![])
        }
        async fn get_configuration(&self, _instance_id: &str) -> ControlResult<DeclaredConfiguration> {
            Ok(DeclaredConfiguration::new(ServerBinding::default()))
        }
        async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RuntimeInfo::stopped(instance_id))
        }
        async fn start(&self, instance_id: &str, _config: DeclaredConfiguration) -> ControlResult<RuntimeInfo> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RuntimeInfo::started(instance_id, PlatformHandle::ProcessId(1)))
        }
        async fn get_recent_changes(
            &self,
            _since: chrono::DateTime<chrono::Utc>,
            _status_filter: Option<control_shared::domain::InstanceStatus>,
        ) -> ControlResult<Vec<control_shared::domain::StatusChangeRecord>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn restart_stops_then_starts() {
        let client = RecordingClient::default();
        let strategy = RestartStrategy {
            settle_delay: std::time::Duration::from_millis(1),
        };
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        strategy.apply(&client, "inst-1", &desired).await.unwrap();
        assert_eq!(client.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unimplemented_strategies_reject_with_validation_error() {
        let client = RecordingClient::default();
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let result = CanaryStrategy.apply(&client, "inst-1", &desired).await;
        assert!(matches!(result, Err(ControlError::Validation(_))));
    }
}
