use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire envelope for a request that expects a reply. Pure publishes are
/// transmitted as the raw payload instead of this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub request: Value,
    pub reply_channel: String,
}

/// Peels a `{request, replyChannel}` envelope off raw bytes if present,
/// returning the inner payload and the reply channel. Falls back to
/// treating the bytes as a raw payload with no reply channel.
pub fn peel(raw: &[u8]) -> (Value, Option<String>) {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(map)) if map.contains_key("request") && map.contains_key("replyChannel") => {
            let reply_channel = map
                .get("replyChannel")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let request = map.get("request").cloned().unwrap_or(Value::Null);
            (request, reply_channel)
        }
        Ok(other) => (other, None),
        Err(_) => (Value::Null, None),
    }
}

pub fn wrap(request: Value, reply_channel: impl Into<String>) -> Envelope {
    Envelope {
        request,
        reply_channel: reply_channel.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn peels_envelope_shape() {
        let env = wrap(json!({"kind": "Start"}), "instance.commands.process.response.abc");
        let raw = serde_json::to_vec(&env).unwrap();
        let (request, reply) = peel(&raw);
        assert_eq!(request, json!({"kind": "Start"}));
        assert_eq!(reply.as_deref(), Some("instance.commands.process.response.abc"));
    }

    #[test]
    fn raw_publish_has_no_reply_channel() {
        let raw = serde_json::to_vec(&json!({"kind": "Stop"})).unwrap();
        let (request, reply) = peel(&raw);
        assert_eq!(request, json!({"kind": "Stop"}));
        assert!(reply.is_none());
    }
}
