//! Structured error types shared by every control-plane component.

use thiserror::Error;

/// The seven error kinds recognized across the control plane.
///
/// Every component maps its failures into one of these variants rather than
/// letting component-specific error types leak across crate boundaries.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The instance id is not known to the metadata store.
    #[error("instance not found: {0}")]
    NotFound(String),

    /// The operation is invalid given the instance's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The bus failed to publish, subscribe, or deliver a message.
    #[error("transport error: {0}")]
    Transport(String),

    /// A reply was not received within the allotted deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A subprocess, container, or pod operation failed.
    #[error("platform failure: {0}")]
    PlatformFailure(String),

    /// The operation's cancellation token fired before completion.
    #[error("cancelled")]
    Cancelled,

    /// Input was malformed (a bad patch, an invalid port, etc).
    #[error("validation error: {0}")]
    Validation(String),
}

impl ControlError {
    /// True for errors a retrying caller should not expect to resolve by
    /// simply trying again (bad input, unknown id, invalid state).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControlError::NotFound(_) | ControlError::Conflict(_) | ControlError::Validation(_)
        )
    }
}

/// Result alias used throughout the control plane.
pub type ControlResult<T> = Result<T, ControlError>;
