// Copyright 2025 Convolens (https://github.com/convolens)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use convolens_core::DEFAULT_TRANSCRIPT_WINDOW;

/// Convolens Server Configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP API listen address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding the per-user JSON documents. An empty string runs
    /// the store in memory only, with no persistence across restarts.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Number of transcript fragments retained per user
    #[serde(default = "default_transcript_window")]
    pub transcript_window: usize,
}

impl StorageConfig {
    /// Data directory as a path, or `None` for memory-only operation.
    pub fn data_path(&self) -> Option<PathBuf> {
        if self.data_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.data_dir))
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentsConfig {
    /// Seconds between producer scheduling ticks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Named expert agents. Each one publishes to its own channel, and
    /// polling for proactive insights fans out across this list.
    #[serde(default = "default_experts")]
    pub experts: Vec<String>,
}

// Default values
fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_data_dir() -> String {
    "./convolens-data".to_string()
}

fn default_transcript_window() -> usize {
    DEFAULT_TRANSCRIPT_WINDOW
}

fn default_tick_secs() -> u64 {
    5
}

fn default_experts() -> Vec<String> {
    vec![
        "statistician".to_string(),
        "fact_checker".to_string(),
        "devils_advocate".to_string(),
    ]
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: default_enable_cors(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            transcript_window: default_transcript_window(),
        }
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            experts: default_experts(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: HttpServerConfig::default(),
            storage: StorageConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - CONVOLENS_LISTEN_ADDR: HTTP listen address (default: 0.0.0.0:8080)
    /// - CONVOLENS_DATA_DIR: Data directory path; empty for memory-only
    /// - CONVOLENS_ENABLE_CORS: Enable CORS (default: true)
    /// - CONVOLENS_TRANSCRIPT_WINDOW: Fragments retained per user (default: 2)
    /// - CONVOLENS_AGENT_TICK_SECS: Seconds between producer ticks (default: 5)
    /// - CONVOLENS_EXPERTS: Comma-separated expert agent names
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CONVOLENS_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Ok(cors) = std::env::var("CONVOLENS_ENABLE_CORS") {
            config.server.enable_cors = cors.parse().unwrap_or(true);
        }

        if let Ok(data_dir) = std::env::var("CONVOLENS_DATA_DIR") {
            config.storage.data_dir = data_dir;
        }

        if let Ok(window) = std::env::var("CONVOLENS_TRANSCRIPT_WINDOW") {
            if let Ok(val) = window.parse() {
                config.storage.transcript_window = val;
            }
        }

        if let Ok(tick) = std::env::var("CONVOLENS_AGENT_TICK_SECS") {
            if let Ok(val) = tick.parse() {
                config.agents.tick_secs = val;
            }
        }

        if let Ok(experts) = std::env::var("CONVOLENS_EXPERTS") {
            config.agents.experts = experts.split(',').map(String::from).collect();
        }

        config
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        // Override with environment variables
        config = Self::merge_with_env(config);

        Ok(config)
    }

    /// Merge config with environment variables (env takes priority)
    fn merge_with_env(mut config: Self) -> Self {
        let env_config = Self::from_env();

        // Only override if env var was explicitly set
        if std::env::var("CONVOLENS_LISTEN_ADDR").is_ok() {
            config.server.listen_addr = env_config.server.listen_addr;
        }
        if std::env::var("CONVOLENS_ENABLE_CORS").is_ok() {
            config.server.enable_cors = env_config.server.enable_cors;
        }
        if std::env::var("CONVOLENS_DATA_DIR").is_ok() {
            config.storage.data_dir = env_config.storage.data_dir;
        }
        if std::env::var("CONVOLENS_TRANSCRIPT_WINDOW").is_ok() {
            config.storage.transcript_window = env_config.storage.transcript_window;
        }
        if std::env::var("CONVOLENS_AGENT_TICK_SECS").is_ok() {
            config.agents.tick_secs = env_config.agents.tick_secs;
        }
        if std::env::var("CONVOLENS_EXPERTS").is_ok() {
            config.agents.experts = env_config.agents.experts;
        }

        config
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Validate socket address
        self.socket_addr()?;

        if self.storage.transcript_window == 0 {
            anyhow::bail!("storage.transcript_window must be at least 1");
        }

        if self.agents.tick_secs == 0 {
            anyhow::bail!("agents.tick_secs must be at least 1");
        }

        if self.agents.experts.iter().any(|name| name.is_empty()) {
            anyhow::bail!("agents.experts must not contain empty names");
        }

        // Validate data directory is writable
        if let Some(data_path) = self.storage.data_path() {
            if !data_path.exists() {
                std::fs::create_dir_all(&data_path)?;
            }
        }

        Ok(())
    }
}
