use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::instance::InstanceStatus;

/// Lifecycle and status events broadcast by workers and the API node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    InstanceStarted {
        instance_id: String,
        correlation_id: Uuid,
    },
    InstanceStopped {
        instance_id: String,
        correlation_id: Uuid,
    },
    InstanceDeleted {
        instance_id: String,
        correlation_id: Uuid,
    },
    InstanceStatusChanged {
        instance_id: String,
        correlation_id: Uuid,
        old: InstanceStatus,
        new: InstanceStatus,
        source: String,
    },
    ConfigurationChanged {
        instance_id: String,
        correlation_id: Uuid,
    },
}

impl Event {
    pub fn instance_id(&self) -> &str {
        match self {
            Event::InstanceStarted { instance_id, .. }
            | Event::InstanceStopped { instance_id, .. }
            | Event::InstanceDeleted { instance_id, .. }
            | Event::InstanceStatusChanged { instance_id, .. }
            | Event::ConfigurationChanged { instance_id, .. } => instance_id,
        }
    }
}
