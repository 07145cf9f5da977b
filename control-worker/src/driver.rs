use async_trait::async_trait;
use control_shared::domain::{DeclaredConfiguration, RuntimeInfo, ServerBinding};
use control_shared::ControlResult;

use crate::port_allocator::PortAllocator;

/// Capability set every platform backend implements. The API node's
/// `platformKind` enum routes a command to the matching channel; a worker
/// then dispatches the command to exactly one of these implementations.
#[async_trait]
pub trait PlatformDriver: Send + Sync + std::fmt::Debug {
    async fn start(&self, instance_id: &str, config: &DeclaredConfiguration) -> ControlResult<RuntimeInfo>;
    async fn stop(&self, instance_id: &str) -> ControlResult<RuntimeInfo>;
    async fn restart(&self, instance_id: &str, config: Option<&DeclaredConfiguration>) -> ControlResult<RuntimeInfo>;
    async fn status(&self, instance_id: &str) -> ControlResult<RuntimeInfo>;
    async fn list_all(&self) -> ControlResult<Vec<RuntimeInfo>>;
    async fn available(&self) -> bool;
    async fn allocate(&self, allocator: &PortAllocator) -> ControlResult<ServerBinding>;
}
