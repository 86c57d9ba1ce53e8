//! Agent configuration management.
//!
//! Configuration is stored as TOML at `~/.config/blockwise/agent.toml`
//! unless `BLOCKWISE_CONFIG` names another file.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use blockwise_protocol::ResourcePath;
use blockwise_server::{DEFAULT_BIND, DEFAULT_PORT, ServerConfig};
use blockwise_transfer::{DEFAULT_BLOCK_SIZE, DEFAULT_BUSY_MAX_AGE, EngineConfig};

/// Environment variable overriding the configuration file location.
pub const CONFIG_ENV: &str = "BLOCKWISE_CONFIG";

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address to bind the UDP socket to.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    /// UDP port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Block size used when a client does not ask for one.
    #[serde(default = "default_block_size")]
    pub default_block_size: u16,

    /// Responses remembered for retransmission replay.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Max-Age in seconds sent with "busy" responses (0 = omit).
    #[serde(default = "default_busy_max_age")]
    pub busy_max_age: u32,

    /// Resources served by the agent.
    #[serde(default = "default_resources")]
    pub resources: Vec<ResourceConfig>,
}

/// One served resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConfig {
    /// `size` bytes where byte `i` is `i % 128`.
    Pattern {
        path: ResourcePath,
        size: usize,
        #[serde(default = "default_pattern_burst")]
        burst: usize,
    },
    /// Contents of a file on disk.
    File {
        path: ResourcePath,
        file: PathBuf,
        #[serde(default)]
        burst: usize,
    },
}

impl ResourceConfig {
    pub fn path(&self) -> &ResourcePath {
        match self {
            Self::Pattern { path, .. } | Self::File { path, .. } => path,
        }
    }
}

fn default_bind() -> IpAddr {
    DEFAULT_BIND
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_block_size() -> u16 {
    DEFAULT_BLOCK_SIZE
}

fn default_cache_capacity() -> usize {
    1
}

fn default_busy_max_age() -> u32 {
    DEFAULT_BUSY_MAX_AGE
}

fn default_pattern_burst() -> usize {
    1000
}

fn default_resources() -> Vec<ResourceConfig> {
    vec![ResourceConfig::Pattern {
        path: ResourcePath::from_segments(["1337", "1", "5"]).unwrap_or_default(),
        size: 9001,
        burst: default_pattern_burst(),
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            default_block_size: default_block_size(),
            cache_capacity: default_cache_capacity(),
            busy_max_age: default_busy_max_age(),
            resources: default_resources(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, or creates a default if not found.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, writing defaults there if missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            port: self.port,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            default_block_size: self.default_block_size,
            cache_capacity: self.cache_capacity,
            busy_max_age: (self.busy_max_age > 0).then_some(self.busy_max_age),
        }
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home)
        .join(".config")
        .join("blockwise")
        .join("agent.toml")
}
