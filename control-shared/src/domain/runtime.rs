use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::instance::InstanceStatus;

/// Platform-specific handle to a running managed server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlatformHandle {
    ProcessId(u32),
    ContainerId(String),
    Pod { name: String, namespace: String },
}

/// Observed state of an instance, as seen by the worker that manages it.
///
/// Written by workers after executing a command and by the status-update
/// ingress path; read by the API node and the reconciler. At most one
/// `RuntimeInfo` exists per instance id — absence means "never started".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInfo {
    pub instance_id: String,
    pub status: InstanceStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub handle: Option<PlatformHandle>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub error_message: Option<String>,
}

impl RuntimeInfo {
    pub fn started(instance_id: impl Into<String>, handle: PlatformHandle) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: InstanceStatus::Running,
            started_at: Some(Utc::now()),
            stopped_at: None,
            handle: Some(handle),
            metadata: HashMap::new(),
            error_message: None,
        }
    }

    pub fn stopped(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: InstanceStatus::Stopped,
            started_at: None,
            stopped_at: Some(Utc::now()),
            handle: None,
            metadata: HashMap::new(),
            error_message: None,
        }
    }

    pub fn errored(instance_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            status: InstanceStatus::Error,
            started_at: None,
            stopped_at: None,
            handle: None,
            metadata: HashMap::new(),
            error_message: Some(error_message.into()),
        }
    }
}
