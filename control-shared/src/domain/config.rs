use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Network binding a managed server is declared to listen on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerBinding {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerBinding {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
        }
    }
}

/// The desired state of a managed server instance.
///
/// `sources`, `queries`, and `reactions` are opaque records from the core's
/// point of view: their internal shape is whatever the managed server
/// expects, and the core only ever compares them structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredConfiguration {
    #[serde(flatten)]
    pub binding: ServerBinding,
    #[serde(default)]
    pub sources: Vec<Value>,
    #[serde(default)]
    pub queries: Vec<Value>,
    #[serde(default)]
    pub reactions: Vec<Value>,
}

impl DeclaredConfiguration {
    pub fn new(binding: ServerBinding) -> Self {
        Self {
            binding,
            sources: Vec::new(),
            queries: Vec::new(),
            reactions: Vec::new(),
        }
    }

    /// Serializes this configuration as the YAML document the process
    /// driver materializes to `{configDir}/{id}-config.yaml`.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip_is_structurally_equal() {
        let cfg = DeclaredConfiguration::new(ServerBinding::default());
        let yaml = cfg.to_yaml().expect("serialize");
        let parsed = DeclaredConfiguration::from_yaml(&yaml).expect("parse");
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn default_binding_has_sane_defaults() {
        let binding = ServerBinding::default();
        assert_eq!(binding.host, "127.0.0.1");
        assert_eq!(binding.port, 8080);
    }
}
