//! Configuration loading and management.

use crate::types::DeletePolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tree: TreeConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Port for the HTTP API.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            port: default_port(),
        }
    }
}

/// Tree mutation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// What happens to descendants when a node is deleted.
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            delete_policy: DeletePolicy::default(),
        }
    }
}

/// Client reconciler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Bound on the commit await, in milliseconds.
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_ms: u64,

    /// Retries for conflict/transport failures before rolling back.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            commit_timeout_ms: default_commit_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".task-forest/tasks.db")
}

fn default_port() -> u16 {
    8420
}

fn default_commit_timeout() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    2
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from the default location or fall back to
    /// defaults, with environment variable overrides.
    pub fn load_or_default() -> Self {
        let mut config =
            Self::load(".task-forest/config.yaml").unwrap_or_default();

        if let Ok(db_path) = std::env::var("TASK_FOREST_DB_PATH") {
            config.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(port) = std::env::var("TASK_FOREST_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }

        config
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
