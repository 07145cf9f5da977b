use async_trait::async_trait;
use control_shared::ControlResult;
use tokio::sync::broadcast;

/// The narrow transport seam the bus is built on: channel-addressed fanout
/// publish and per-channel subscription, with per-subscriber delivery order
/// preserved but no cross-channel ordering and no exactly-once guarantee.
///
/// Any real pub/sub system satisfying those properties can back this trait;
/// the control plane treats the transport as an external collaborator.
#[async_trait]
pub trait MessageTransport: Send + Sync + std::fmt::Debug {
    /// Hands `payload` to the transport for fanout on `channel`. Returns
    /// once the transport has acknowledged receipt, not delivery.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> ControlResult<()>;

    /// Registers interest in `channel`, returning a receiver that yields
    /// raw payloads as they are published. Multiple subscribers to the same
    /// channel each receive their own copy.
    async fn subscribe(&self, channel: &str) -> ControlResult<broadcast::Receiver<Vec<u8>>>;
}
