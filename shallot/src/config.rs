// Copyright (c) 2024 Botho Foundation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default host every service binds on
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default node directory port
pub const DEFAULT_REGISTRY_PORT: u16 = 8080;

/// Relay `n` listens on this port plus `n`
pub const DEFAULT_BASE_RELAY_PORT: u16 = 4000;

/// User `n` listens on this port plus `n`
pub const DEFAULT_BASE_USER_PORT: u16 = 3000;

/// Main configuration for Shallot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub circuit: CircuitConfig,
    #[serde(default)]
    pub launch: LaunchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Host the registry, relays and users bind on
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the node directory
    #[serde(default = "default_registry_port")]
    pub registry_port: u16,

    /// Relay ports are derived as base_relay_port + node id
    #[serde(default = "default_base_relay_port")]
    pub base_relay_port: u16,

    /// User ports are derived as base_user_port + user id
    #[serde(default = "default_base_user_port")]
    pub base_user_port: u16,

    /// Timeout for each outbound HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_registry_port() -> u16 {
    DEFAULT_REGISTRY_PORT
}

fn default_base_relay_port() -> u16 {
    DEFAULT_BASE_RELAY_PORT
}

fn default_base_user_port() -> u16 {
    DEFAULT_BASE_USER_PORT
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            registry_port: default_registry_port(),
            base_relay_port: default_base_relay_port(),
            base_user_port: default_base_user_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl NetworkConfig {
    /// Per-request timeout for outbound HTTP calls
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitConfig {
    /// Number of relays per circuit
    #[serde(default = "default_circuit_length")]
    pub length: usize,
}

fn default_circuit_length() -> usize {
    3
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            length: default_circuit_length(),
        }
    }
}

/// Sizes for `shallot launch`, which runs a whole network in one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default = "default_relay_count")]
    pub relay_count: u32,

    #[serde(default = "default_user_count")]
    pub user_count: u32,
}

fn default_relay_count() -> u32 {
    10
}

fn default_user_count() -> u32 {
    2
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            relay_count: default_relay_count(),
            user_count: default_user_count(),
        }
    }
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load config from a file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if Self::exists(path) {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }
}

/// Get the default config directory path
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".shallot"))
        .context("Could not determine home directory")
}

/// Get the default config file path
pub fn default_config_path() -> Result<PathBuf> {
    Ok(default_data_dir()?.join("config.toml"))
}
