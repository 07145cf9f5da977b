use serde::Deserialize;

/// Layered API node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

impl ApiConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("control-api").required(false))
            .add_source(config::Environment::with_prefix("CONTROL_API").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}
