use async_trait::async_trait;
use control_shared::domain::{DeclaredConfiguration, Instance, RuntimeInfo, StatusChangeRecord};
use control_shared::{ControlError, ControlResult};

/// The reconciler's view of the API node: listing instances, fetching
/// desired configuration, and driving start/stop. Kept as a trait so tests
/// exercise the reconciler against an in-process stub instead of a real
/// HTTP round trip.
#[async_trait]
pub trait ApiClient: Send + Sync + std::fmt::Debug {
    async fn list_instances(&self) -> ControlResult<Vec<Instance>>;
    async fn get_configuration(&self, instance_id: &str) -> ControlResult<DeclaredConfiguration>;
    async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo>;
    async fn start(&self, instance_id: &str, config: DeclaredConfiguration) -> ControlResult<RuntimeInfo>;
    async fn get_recent_changes(
        &self,
        since: chrono::DateTime<chrono::Utc>,
        status_filter: Option<control_shared::domain::InstanceStatus>,
    ) -> ControlResult<Vec<StatusChangeRecord>>;
}

/// HTTP implementation of [`ApiClient`] against a deployed API node.
#[derive(Debug)]
pub struct HttpApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn list_instances(&self) -> ControlResult<Vec<Instance>> {
        self.client
            .get(format!("{}/instances", self.base_url))
            .send()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ControlError::Transport(format!("malformed response: {e}")))
    }

    async fn get_configuration(&self, instance_id: &str) -> ControlResult<DeclaredConfiguration> {
        self.client
            .get(format!("{}/instances/{instance_id}/configuration", self.base_url))
            .send()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ControlError::Transport(format!("malformed response: {e}")))
    }

    async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo> {
        self.client
            .post(format!("{}/instances/{instance_id}/stop", self.base_url))
            .send()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ControlError::Transport(format!("malformed response: {e}")))
    }

    async fn start(&self, instance_id: &str, config: DeclaredConfiguration) -> ControlResult<RuntimeInfo> {
        self.client
            .post(format!("{}/instances/{instance_id}/start", self.base_url))
            .json(&serde_json::json!({ "configuration": config }))
            .send()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ControlError::Transport(format!("malformed response: {e}")))
    }

    async fn get_recent_changes(
        &self,
        since: chrono::DateTime<chrono::Utc>,
        status_filter: Option<control_shared::domain::InstanceStatus>,
    ) -> ControlResult<Vec<StatusChangeRecord>> {
        let mut url = format!("{}/status/recent?since={}", self.base_url, since.to_rfc3339());
        if let Some(status) = status_filter {
            url.push_str(&format!("&statusFilter={status:?}"));
        }
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| ControlError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ControlError::Transport(format!("malformed response: {e}")))
    }
}
