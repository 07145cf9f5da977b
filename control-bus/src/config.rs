use serde::Deserialize;

/// Which concrete [`crate::MessageTransport`] a deployment wires the bus to.
/// Only `InMemory` is implemented in this workspace; the variant exists so
/// `BusConfig` has something real to parse from `CONTROL_BUS_TRANSPORT`
/// rather than hard-coding the transport choice into every binary.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    InMemory,
}

/// Layered bus configuration (defaults + TOML file + environment
/// overrides), following the same `config` crate pattern used by every
/// other component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub transport: TransportKind,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::InMemory,
        }
    }
}

impl BusConfig {
    /// Loads configuration layering a TOML file (if present) over defaults,
    /// then `CONTROL_BUS_*` environment variables over that.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("control-bus").required(false))
            .add_source(config::Environment::with_prefix("CONTROL_BUS").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_in_memory_transport() {
        let cfg = BusConfig::default();
        assert_eq!(cfg.transport, TransportKind::InMemory);
    }
}
