//! Shared configuration for the gateway and core.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global application configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Application identity shown in logs and `/v1/status`.
    pub app_name: String,
    /// Display name of the live character.
    pub character_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// LLM mode: "live" calls the hosted completion API, "mock" streams a canned reply.
    pub llm_mode: String,
    /// Live-stream account the ingress follows. Empty disables ingestion.
    #[serde(default)]
    pub stream_username: String,
    /// Base URL of the live-feed relay the ingress connects to.
    #[serde(default = "default_webcast_url")]
    pub webcast_url: String,
    /// If true, the gateway serves the static viewer page from `frontend/`.
    #[serde(default)]
    pub frontend_enabled: bool,
}

fn default_webcast_url() -> String {
    "http://localhost:8080/webcast".to_string()
}

impl CoreConfig {
    /// Load config from file and environment. Precedence: env `AIKO_CONFIG` path > `config/gateway.toml` > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("AIKO_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Aiko Gateway")?
            .set_default("character_name", "Aiko")?
            .set_default("port", 3000_i64)?
            .set_default("llm_mode", "live")?
            .set_default("stream_username", "")?
            .set_default("webcast_url", default_webcast_url())?
            .set_default("frontend_enabled", false)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("AIKO").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
