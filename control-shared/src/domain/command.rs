use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::DeclaredConfiguration;

/// The four operations a platform worker accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    Start,
    Stop,
    Restart,
    Delete,
}

/// A command published on a platform's command channel.
///
/// `configuration` is only ever present for `Start` and `Restart`. Whether a
/// reply is expected is carried out-of-band by the bus's envelope mechanism
/// ([`control_bus::envelope`]), not by a field on this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub kind: CommandKind,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<DeclaredConfiguration>,
    pub correlation_id: Uuid,
}

impl Command {
    pub fn new(kind: CommandKind, instance_id: impl Into<String>) -> Self {
        Self {
            kind,
            instance_id: instance_id.into(),
            configuration: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_configuration(mut self, configuration: DeclaredConfiguration) -> Self {
        self.configuration = Some(configuration);
        self
    }
}
