//! Service configuration, loadable from TOML with environment overrides.

use serde::Deserialize;

use pd_diagnosis::DiagnosisConfig;
use pd_inference::{CacheConfig, InferenceConfig, ProviderConfig};

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on request bodies; base64 images are large.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Recent diagnoses kept in memory for the list endpoint.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_history_capacity() -> usize {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    /// JSON knowledge base. The bundled sample is used when absent.
    #[serde(default)]
    pub knowledge_base_path: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Providers in try order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
}

impl ServiceConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// `PD_CONFIG` names the TOML file (defaults apply without it);
    /// `PD_HOST` and `PD_PORT` override the listener.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = match std::env::var("PD_CONFIG") {
            Ok(path) => {
                tracing::info!(path = %path, "loading configuration");
                Self::from_file(&path)?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(
            std::env::var("PD_HOST").ok(),
            std::env::var("PD_PORT").ok(),
        )?;
        Ok(config)
    }

    fn apply_overrides(&mut self, host: Option<String>, port: Option<String>) -> anyhow::Result<()> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PD_PORT '{port}': {e}"))?;
        }
        Ok(())
    }

    /// Provider and cache settings for the inference client.
    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig {
            providers: self.providers.clone(),
            cache: self.cache.clone(),
        }
    }
}
