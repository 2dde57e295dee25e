//! Provider credentials/config, loadable from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Vendor wire format a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Local Ollama `/api/chat`.
    Ollama,
    /// OpenAI-compatible `/chat/completions`.
    Openai,
    /// AWS Bedrock Converse API.
    Bedrock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Openai => "openai",
            Self::Bedrock => "bedrock",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "llava:13b",
            Self::Openai => "gpt-4o-mini",
            Self::Bedrock => "us.amazon.nova-lite-v1:0",
        }
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => Some("http://localhost:11434"),
            Self::Openai => Some("https://api.openai.com/v1"),
            Self::Bedrock => None,
        }
    }
}

/// One entry of the ordered provider list.
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    /// Name used in logs and failure reports (defaults to the kind).
    #[serde(default)]
    pub name: Option<String>,
    pub kind: ProviderKind,
    /// Base URL (Ollama/OpenAI). Ignored for Bedrock.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Per-call deadline enforced by the client.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Attempts per call inside the adapter, without backoff.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Inline API key. Prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// AWS region override for Bedrock.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            name: None,
            kind,
            endpoint: None,
            model: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            api_key: None,
            api_key_env: None,
            region: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .or(self.kind.default_endpoint())
            .map(|e| e.trim_end_matches('/'))
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(self.kind.default_model())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Inline key first, then the named environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
        })
    }
}

// Secrets never reach logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.display_name())
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint())
            .field("model", &self.model())
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("region", &self.region)
            .finish()
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_cache_enabled() -> bool {
    true
}
fn default_ttl_secs() -> u64 {
    3600
}
fn default_max_entries() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Ordered provider list plus cache settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl InferenceConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
