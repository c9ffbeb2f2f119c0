use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

/// One supervised assistant adapter. Built once at orchestrator startup
/// and immutable for the life of the child process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    /// Assistant identity, e.g. "claude" or "copilot". Also used as the
    /// log tag and the `sync:<name>` channel suffix.
    pub name: String,
    /// Launch target. Empty means "re-invoke the current executable in
    /// adapter mode", which is the normal deployment.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Capability profile selecting the tool catalog.
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Extra environment merged over the orchestrator's own environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_profile() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

fn default_backend_url() -> String {
    "http://localhost:8700".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    #[serde(default = "default_broker_url")]
    pub url: String,
}

fn default_broker_url() -> String {
    "ws://localhost:8701".to_string()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Delay between consecutive adapter spawns, so N adapters do not hit
    /// the backend auth endpoint in the same instant.
    #[serde(default = "default_spawn_stagger_ms")]
    pub spawn_stagger_ms: u64,
    /// Fixed delay before restarting a crashed adapter.
    #[serde(default = "default_restart_backoff_ms")]
    pub restart_backoff_ms: u64,
}

fn default_spawn_stagger_ms() -> u64 {
    750
}

fn default_restart_backoff_ms() -> u64 {
    5_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            spawn_stagger_ms: default_spawn_stagger_ms(),
            restart_backoff_ms: default_restart_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
}

impl BridgeConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn adapter(&self, name: &str) -> Option<&AdapterConfig> {
        self.adapters.iter().find(|a| a.name == name)
    }
}
