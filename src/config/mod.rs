use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub heavy: HeavyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum number of requests admitted concurrently; further requests wait
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory under which the per-process cache directory is created
    #[serde(default = "default_cache_parent")]
    pub parent_dir: PathBuf,
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,
    /// Cache writes are skipped once the cache directory holds this many bytes
    #[serde(default = "default_cache_quota_bytes")]
    pub quota_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeavyConfig {
    /// Fixed cost paid by the heavy worker before each big/ultra render
    #[serde(
        default = "default_heavy_delay",
        with = "duration_serde::duration"
    )]
    pub simulated_delay: Duration,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

// Cache defaults
fn default_cache_parent() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PARENT)
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.to_string()
}

fn default_cache_quota_bytes() -> u64 {
    DEFAULT_CACHE_QUOTA_BYTES
}

// Render defaults
fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

// Heavy defaults
fn default_heavy_delay() -> Duration {
    humantime::parse_duration(DEFAULT_HEAVY_DELAY).unwrap_or(Duration::from_secs(20))
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            parent_dir: default_cache_parent(),
            prefix: default_cache_prefix(),
            quota_bytes: default_cache_quota_bytes(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for HeavyConfig {
    fn default() -> Self {
        Self {
            simulated_delay: default_heavy_delay(),
        }
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        let config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            default_config
        };
        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Self) -> Result<()> {
        if config.web.max_connections == 0 {
            anyhow::bail!("web.max_connections must be at least 1");
        }
        if config.render.max_iterations == 0 {
            anyhow::bail!("render.max_iterations must be at least 1");
        }
        Ok(())
    }
}
