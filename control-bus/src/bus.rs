use std::sync::Arc;
use std::time::{Duration, Instant};

use control_shared::resilience::CircuitBreaker;
use control_shared::{ControlError, ControlResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::timeout as tokio_timeout;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::envelope::{peel, wrap};
use crate::transport::MessageTransport;

/// Domain-facing facade over a [`MessageTransport`], providing typed
/// publish/subscribe and a synchronous request/reply primitive.
///
/// Mirrors the provider-wrapping pattern used elsewhere in this workspace:
/// the bus itself carries no transport-specific code, and an optional
/// circuit breaker gates the request path so a wedged transport fails fast
/// instead of piling up timed-out callers.
#[derive(Debug)]
pub struct Bus {
    transport: Arc<dyn MessageTransport>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
}

impl Bus {
    pub fn new(transport: Arc<dyn MessageTransport>) -> Self {
        Self {
            transport,
            circuit_breaker: None,
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    /// Serializes `message` and hands it to the transport as a raw publish.
    /// Never blocks on subscribers.
    pub async fn publish<T: Serialize>(&self, channel: &str, message: &T) -> ControlResult<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| ControlError::Validation(format!("serialize failed: {e}")))?;
        self.transport.publish(channel, payload).await
    }

    /// Subscribes to `channel`, spawning a task that deserializes each
    /// delivery as `T` and invokes `handler`. Deserialization failures are
    /// logged and dropped, never propagated to the handler. If the incoming
    /// payload is a `{request, replyChannel}` envelope, the reply channel is
    /// peeled off and passed to the handler out of band.
    pub async fn subscribe<T, F>(&self, channel: &str, handler: F) -> ControlResult<()>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(T, Option<String>) + Send + Sync + 'static,
    {
        let mut rx = self.transport.subscribe(channel).await?;
        let channel_owned = channel.to_string();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(raw) => {
                        let (payload, reply_channel) = peel(&raw);
                        match serde_json::from_value::<T>(payload) {
                            Ok(message) => handler(message, reply_channel),
                            Err(e) => {
                                warn!(channel = %channel_owned, error = %e, "dropping undeserializable message");
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel = %channel_owned, skipped, "subscriber lagged, messages dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Ok(())
    }

    /// Subscribe-publish-await-unsubscribe request/reply: generates a
    /// unique reply channel, subscribes to it, publishes the
    /// `{request, replyChannel}` envelope to `channel`, and waits for one
    /// message or the timeout. The reply subscription is torn down on every
    /// exit path.
    pub async fn request<Req, Resp>(
        &self,
        channel: &str,
        request: Req,
        timeout: Duration,
    ) -> ControlResult<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Send + 'static,
    {
        if let Some(breaker) = &self.circuit_breaker {
            if !breaker.should_allow() {
                return Err(ControlError::Transport(format!(
                    "circuit breaker open for channel {channel}"
                )));
            }
        }

        let reply_channel = format!("{channel}.response.{}", Uuid::new_v4());
        let mut reply_rx = self.transport.subscribe(&reply_channel).await?;

        let request_value = serde_json::to_value(&request)
            .map_err(|e| ControlError::Validation(format!("serialize failed: {e}")))?;
        let envelope = wrap(request_value, reply_channel.clone());
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| ControlError::Validation(format!("serialize failed: {e}")))?;

        let started = Instant::now();
        if let Err(e) = self.transport.publish(channel, payload).await {
            self.record_breaker_failure(started.elapsed());
            return Err(e);
        }

        let wait = tokio_timeout(timeout, reply_rx.recv()).await;
        // Subscription is dropped here regardless of outcome, releasing the
        // reply channel on every exit path.
        match wait {
            Ok(Ok(raw)) => {
                self.record_breaker_success(started.elapsed());
                serde_json::from_slice::<Resp>(&raw)
                    .map_err(|e| ControlError::Validation(format!("malformed reply: {e}")))
            }
            Ok(Err(_)) => {
                self.record_breaker_failure(started.elapsed());
                Err(ControlError::Transport(format!(
                    "reply channel closed before a response arrived on {channel}"
                )))
            }
            Err(_) => {
                self.record_breaker_failure(started.elapsed());
                debug!(channel, ?timeout, "request timed out");
                Err(ControlError::Timeout(timeout))
            }
        }
    }

    fn record_breaker_success(&self, duration: Duration) {
        if let Some(breaker) = &self.circuit_breaker {
            breaker.record_success_manual(duration);
        }
    }

    fn record_breaker_failure(&self, duration: Duration) {
        if let Some(breaker) = &self.circuit_breaker {
            breaker.record_failure_manual(duration);
        }
    }
}

/// A response channel threaded through an application-level oneshot,
/// convenient when a caller inside the same process wants to await a
/// command's outcome without round-tripping through the transport.
pub type LocalReplySender<T> = oneshot::Sender<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::InMemoryTransport;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        value: u32,
    }

    #[tokio::test]
    async fn request_round_trips_through_reply_channel() {
        let transport = Arc::new(InMemoryTransport::new());
        let bus = Bus::new(transport.clone());

        bus.subscribe::<Ping, _>("echo", {
            let transport = transport.clone();
            move |msg, reply_channel| {
                let transport = transport.clone();
                let reply_channel = reply_channel.expect("request carries a reply channel");
                tokio::spawn(async move {
                    let payload = serde_json::to_vec(&msg).unwrap();
                    transport.publish(&reply_channel, payload).await.unwrap();
                });
            }
        })
        .await
        .unwrap();

        let response: Ping = bus
            .request("echo", Ping { value: 7 }, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response, Ping { value: 7 });
    }

    #[tokio::test]
    async fn request_times_out_with_no_subscriber() {
        let transport = Arc::new(InMemoryTransport::new());
        let bus = Bus::new(transport);
        let result: ControlResult<Ping> = bus
            .request("nobody-home", Ping { value: 1 }, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(ControlError::Timeout(_))));
    }

    #[tokio::test]
    async fn subscribe_drops_undeserializable_messages_without_panicking() {
        let transport = Arc::new(InMemoryTransport::new());
        let bus = Bus::new(transport.clone());
        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();

        bus.subscribe::<Ping, _>("typed", move |msg, _| {
            received_clone.lock().unwrap().push(msg);
        })
        .await
        .unwrap();

        transport.publish("typed", b"not json".to_vec()).await.unwrap();
        transport
            .publish("typed", serde_json::to_vec(&Ping { value: 3 }).unwrap())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let guard = received.lock().unwrap();
        assert_eq!(guard.len(), 1);
        assert_eq!(guard[0], Ping { value: 3 });
    }
}
