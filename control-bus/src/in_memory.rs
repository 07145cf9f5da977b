use async_trait::async_trait;
use control_shared::ControlResult;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::trace;

use crate::transport::MessageTransport;

const CHANNEL_CAPACITY: usize = 1024;

/// A default, in-process transport backed by one `broadcast` channel per
/// topic. Sufficient for tests and single-process deployments; a real
/// deployment swaps in a transport backed by an actual message broker
/// without the rest of the bus caring.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    channels: DashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> ControlResult<()> {
        let sender = self.sender_for(channel);
        // No subscribers is not an error: publish never blocks on them.
        if sender.send(payload).is_err() {
            trace!(channel, "publish with no active subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> ControlResult<broadcast::Receiver<Vec<u8>>> {
        let sender = self.sender_for(channel);
        Ok(sender.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_payload() {
        let transport = InMemoryTransport::new();
        let mut rx = transport.subscribe("topic").await.unwrap();
        transport.publish("topic", b"hello".to_vec()).await.unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let transport = InMemoryTransport::new();
        let result = transport.publish("nobody-listening", b"x".to_vec()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn each_subscriber_gets_its_own_copy() {
        let transport = InMemoryTransport::new();
        let mut a = transport.subscribe("fanout").await.unwrap();
        let mut b = transport.subscribe("fanout").await.unwrap();
        transport.publish("fanout", b"x".to_vec()).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), b"x");
        assert_eq!(b.recv().await.unwrap(), b"x");
    }
}
