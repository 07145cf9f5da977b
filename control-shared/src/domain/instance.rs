use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How an instance is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Process,
    Container,
    Pod,
}

impl PlatformKind {
    /// The fixed bus channel this platform's workers consume commands from.
    pub fn command_channel(&self) -> &'static str {
        match self {
            PlatformKind::Process => "instance.commands.process",
            PlatformKind::Container => "instance.commands.container",
            PlatformKind::Pod => "instance.commands.pod",
        }
    }
}

/// Instance lifecycle status, mutated only by the API node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    Created,
    Running,
    Stopped,
    Error,
    ConfigurationChanged,
}

/// Declarative metadata for a managed server instance.
///
/// Owned exclusively by the API node. Status is mutated only in response to
/// worker replies, the status-update ingress endpoint, or explicit user
/// action — never by a background task reading this struct directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub platform_kind: PlatformKind,
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}

impl Instance {
    pub fn new(name: impl Into<String>, platform_kind: PlatformKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: None,
            platform_kind,
            status: InstanceStatus::Created,
            created_at: now,
            last_modified_at: now,
            tags: HashMap::new(),
        }
    }

    pub fn set_status(&mut self, status: InstanceStatus) {
        self.status = status;
        self.last_modified_at = Utc::now();
    }
}
