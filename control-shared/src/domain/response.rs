use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::runtime::RuntimeInfo;

/// The reply published back on a command's reply channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub instance_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_info: Option<RuntimeInfo>,
    pub correlation_id: Uuid,
}

impl Response {
    pub fn success(
        instance_id: impl Into<String>,
        correlation_id: Uuid,
        runtime_info: RuntimeInfo,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            success: true,
            error_message: None,
            runtime_info: Some(runtime_info),
            correlation_id,
        }
    }

    pub fn failure(
        instance_id: impl Into<String>,
        correlation_id: Uuid,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            success: false,
            error_message: Some(error_message.into()),
            runtime_info: None,
            correlation_id,
        }
    }
}
