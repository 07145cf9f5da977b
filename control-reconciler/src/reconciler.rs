use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use control_shared::domain::{AuditEntry, AuditLog, DeclaredConfiguration, Instance, InstanceStatus};
use control_shared::{ControlError, ControlResult};
use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api_client::ApiClient;
use crate::config::ReconcilerConfig;
use crate::drift::{detect, DriftResult};
use crate::strategy::{ReconciliationStrategy, RestartStrategy};

/// Holds the last-applied configuration per instance and the audit trail of
/// every reconciliation attempt, and drives both the periodic sweep and the
/// event-driven (status-change-triggered) reconciliation path.
#[derive(Debug)]
pub struct Reconciler {
    client: Arc<dyn ApiClient>,
    strategy: Arc<dyn ReconciliationStrategy>,
    last_applied: DashMap<String, DeclaredConfiguration>,
    audit: AuditLog,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(client: Arc<dyn ApiClient>, config: ReconcilerConfig) -> Self {
        Self::with_strategy(client, Arc::new(RestartStrategy::new()), config)
    }

    pub fn with_strategy(
        client: Arc<dyn ApiClient>,
        strategy: Arc<dyn ReconciliationStrategy>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            client,
            strategy,
            last_applied: DashMap::new(),
            audit: AuditLog::new(),
            config,
        }
    }

    pub fn audit_for(&self, instance_id: &str) -> Vec<AuditEntry> {
        self.audit.for_instance(instance_id)
    }

    /// True unless the instance's lifecycle status excludes it from
    /// reconciliation under the configured filter rules.
    fn should_reconcile(&self, status: InstanceStatus) -> bool {
        match status {
            InstanceStatus::Stopped => self.config.reconcile_stopped_instances,
            InstanceStatus::Error => self.config.reconcile_error_instances,
            _ => true,
        }
    }

    /// Detects drift for a single instance and, if present, retries the
    /// configured strategy up to `max_retries` times spaced `retry_delay`
    /// apart, the whole attempt bounded by `reconciliation_timeout`.
    pub async fn reconcile_one(&self, instance_id: &str, desired: &DeclaredConfiguration) -> ControlResult<()> {
        let last_applied = self.last_applied.get(instance_id).map(|e| e.value().clone());
        let drift = detect(desired, last_applied.as_ref());

        let DriftResult::Drift(reasons) = drift else {
            self.audit.append(AuditEntry::new(instance_id, "no-drift", false));
            return Ok(());
        };
        info!(instance_id, ?reasons, "drift detected, reconciling");

        let attempt = tokio::time::timeout(
            self.config.reconciliation_timeout(),
            self.retry_until_success(instance_id, desired),
        )
        .await;

        match attempt {
            Ok(Ok(())) => {
                self.last_applied.insert(instance_id.to_string(), desired.clone());
                self.audit.append(AuditEntry::new(instance_id, "reconciled", true));
                Ok(())
            }
            Ok(Err(e)) => {
                self.audit.append(AuditEntry::new(instance_id, format!("failed: {e}"), true));
                Err(e)
            }
            Err(_) => {
                let err = ControlError::Timeout(self.config.reconciliation_timeout());
                self.audit.append(AuditEntry::new(instance_id, "failed: reconciliation timed out", true));
                Err(err)
            }
        }
    }

    async fn retry_until_success(&self, instance_id: &str, desired: &DeclaredConfiguration) -> ControlResult<()> {
        let mut last_err = ControlError::Validation("no attempts made".to_string());
        for attempt in 1..=self.config.max_retries {
            match self.strategy.apply(self.client.as_ref(), instance_id, desired).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(instance_id, attempt, error = %e, "reconciliation attempt failed");
                    last_err = e;
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn reconcile_candidate(&self, instance: &Instance) {
        if !self.should_reconcile(instance.status) {
            return;
        }
        let desired = match self.client.get_configuration(&instance.id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(instance_id = %instance.id, error = %e, "could not fetch desired configuration");
                return;
            }
        };
        if let Err(e) = self.reconcile_one(&instance.id, &desired).await {
            warn!(instance_id = %instance.id, error = %e, "reconciliation failed");
        }
    }

    /// Periodically lists every instance and reconciles candidates under
    /// a bounded-concurrency semaphore, until cancelled.
    pub async fn run_periodic_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.polling_interval());
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("periodic reconciliation loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    self.clone().run_one_sweep(semaphore.clone()).await;
                }
            }
        }
    }

    async fn run_one_sweep(self: Arc<Self>, semaphore: Arc<Semaphore>) {
        let instances = match self.client.list_instances().await {
            Ok(i) => i,
            Err(e) => {
                warn!(error = %e, "could not list instances for reconciliation sweep");
                return;
            }
        };

        let mut handles = Vec::with_capacity(instances.len());
        for instance in instances {
            let permit = semaphore.clone().acquire_owned().await;
            let this = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                this.reconcile_candidate(&instance).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Polls `getRecentChanges` for `ConfigurationChanged` transitions and
    /// reconciles only the instances that changed since the last poll.
    pub async fn run_event_driven_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.event_poll_interval());
        let mut since = Utc::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("event-driven reconciliation loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let now = Utc::now();
                    match self
                        .client
                        .get_recent_changes(since, Some(InstanceStatus::ConfigurationChanged))
                        .await
                    {
                        Ok(changes) => {
                            for change in changes {
                                if let Ok(instance) = self.lookup_instance(&change.instance_id).await {
                                    self.reconcile_candidate(&instance).await;
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "could not poll recent status changes"),
                    }
                    since = now;
                }
            }
        }
    }

    async fn lookup_instance(&self, instance_id: &str) -> ControlResult<Instance> {
        self.client
            .list_instances()
            .await?
            .into_iter()
            .find(|i| i.id == instance_id)
            .ok_or_else(|| ControlError::NotFound(instance_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use control_shared::domain::{PlatformHandle, PlatformKind, RuntimeInfo, ServerBinding, StatusChangeRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct StubClient {
        configuration: DeclaredConfiguration,
        fail_n_times: AtomicUsize,
        stop_calls: AtomicUsize,
        start_calls: AtomicUsize,
        instances: Mutex<Vec<Instance>>,
    }

    impl StubClient {
        fn new(configuration: DeclaredConfiguration, fail_n_times: usize) -> Self {
            Self {
                configuration,
                fail_n_times: AtomicUsize::new(fail_n_times),
                stop_calls: AtomicUsize::new(0),
                start_calls: AtomicUsize::new(0),
                instances: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl ApiClient for StubClient {
        async fn list_instances(&self) -> ControlResult<Vec<Instance>> {
            Ok(self.instances.lock().unwrap().clone())
        }
        async fn get_configuration(&self, _instance_id: &str) -> ControlResult<DeclaredConfiguration> {
            Ok(self.configuration.clone())
        }
        async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RuntimeInfo::stopped(instance_id))
        }
        async fn start(&self, instance_id: &str, _config: DeclaredConfiguration) -> ControlResult<RuntimeInfo> {
            if self.fail_n_times.load(Ordering::SeqCst) > 0 {
                self.fail_n_times.fetch_sub(1, Ordering::SeqCst);
                return Err(ControlError::PlatformFailure("simulated start failure".to_string()));
            }
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RuntimeInfo::started(instance_id, PlatformHandle::ProcessId(42)))
        }
        async fn get_recent_changes(
            &self,
            _since: chrono::DateTime<chrono::Utc>,
            _status_filter: Option<InstanceStatus>,
        ) -> ControlResult<Vec<StatusChangeRecord>> {
            Ok(vec![])
        }
    }

    fn test_config() -> ReconcilerConfig {
        ReconcilerConfig {
            max_retries: 3,
            retry_delay_ms: 1,
            reconciliation_timeout_ms: 2_000,
            ..ReconcilerConfig::default()
        }
    }

    #[tokio::test]
    async fn no_drift_records_audit_entry_without_calling_strategy() {
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired.clone(), 0));
        let reconciler = Reconciler::new(client.clone(), test_config());
        reconciler.last_applied.insert("inst-1".to_string(), desired.clone());

        reconciler.reconcile_one("inst-1", &desired).await.unwrap();
        assert_eq!(client.stop_calls.load(Ordering::SeqCst), 0);
        let entries = reconciler.audit_for("inst-1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "no-drift");
    }

    #[tokio::test]
    async fn drift_triggers_restart_and_updates_last_applied() {
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired.clone(), 0));
        let reconciler = Reconciler::new(client.clone(), test_config());

        reconciler.reconcile_one("inst-1", &desired).await.unwrap();
        assert_eq!(client.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(reconciler.audit_for("inst-1").last().unwrap().action, "reconciled");
    }

    #[tokio::test]
    async fn transient_failures_are_retried_up_to_max_retries() {
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired.clone(), 2));
        let reconciler = Reconciler::new(client.clone(), test_config());

        reconciler.reconcile_one("inst-1", &desired).await.unwrap();
        assert_eq!(client.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_records_failure_and_leaves_last_applied_unset() {
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired.clone(), 10));
        let reconciler = Reconciler::new(client.clone(), test_config());

        let result = reconciler.reconcile_one("inst-1", &desired).await;
        assert!(result.is_err());
        assert!(reconciler.last_applied.get("inst-1").is_none());
        assert!(reconciler.audit_for("inst-1").last().unwrap().action.starts_with("failed"));
    }

    #[tokio::test]
    async fn stopped_instances_are_skipped_unless_configured() {
        let mut config = test_config();
        config.reconcile_stopped_instances = false;
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired, 0));
        let reconciler = Reconciler::new(client, config);
        assert!(!reconciler.should_reconcile(InstanceStatus::Stopped));
        assert!(reconciler.should_reconcile(InstanceStatus::Running));
    }

    #[tokio::test]
    async fn error_instances_are_reconciled_by_default() {
        let config = test_config();
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired, 0));
        let reconciler = Reconciler::new(client, config);
        assert!(reconciler.should_reconcile(InstanceStatus::Error));
    }

    #[tokio::test]
    async fn periodic_sweep_reconciles_only_eligible_instances() {
        let desired = DeclaredConfiguration::new(ServerBinding::default());
        let client = Arc::new(StubClient::new(desired.clone(), 0));
        {
            let mut instances = client.instances.lock().unwrap();
            instances.push(Instance::new("running-one", PlatformKind::Process));
            let mut stopped = Instance::new("stopped-one", PlatformKind::Process);
            stopped.set_status(InstanceStatus::Stopped);
            instances.push(stopped);
        }
        let reconciler = Arc::new(Reconciler::new(client.clone(), test_config()));
        let semaphore = Arc::new(Semaphore::new(5));
        reconciler.clone().run_one_sweep(semaphore).await;
        // Only the running instance should have triggered a restart.
        assert_eq!(client.stop_calls.load(Ordering::SeqCst), 1);
    }
}
