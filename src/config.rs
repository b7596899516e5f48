//! Configuration module for thumbcache

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_EXPIRY, DEFAULT_MAX_DISK_BYTES, DEFAULT_MEMORY_CAPACITY};
use crate::paths;
use crate::source::DEFAULT_BASE_URL;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the photo feed
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory for cached image files (defaults to the platform cache dir)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Age in seconds after which a cached file is removed by maintenance
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,

    /// Total size budget of the disk cache, in bytes
    #[serde(default = "default_max_disk_bytes")]
    pub max_disk_bytes: u64,

    /// Number of decoded images kept in memory
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: NonZeroUsize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Run the expiry sweep before loading anything
    #[serde(default = "default_maintain_on_start")]
    pub maintain_on_start: bool,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

const fn default_expiry_secs() -> u64 {
    DEFAULT_EXPIRY.as_secs()
}

const fn default_max_disk_bytes() -> u64 {
    DEFAULT_MAX_DISK_BYTES
}

const fn default_memory_capacity() -> NonZeroUsize {
    DEFAULT_MEMORY_CAPACITY
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_maintain_on_start() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_dir: None,
            expiry_secs: default_expiry_secs(),
            max_disk_bytes: default_max_disk_bytes(),
            memory_capacity: default_memory_capacity(),
            request_timeout_secs: default_request_timeout(),
            maintain_on_start: default_maintain_on_start(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Directory the disk tier lives in
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::image_cache_dir(),
        }
    }

    /// HTTP request timeout
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings for [`CacheManager`](crate::cache::CacheManager)
    pub const fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            expiry: Duration::from_secs(self.expiry_secs),
            max_disk_bytes: self.max_disk_bytes,
            memory_capacity: self.memory_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.cache_config(), CacheConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_disk_bytes = 1024\nexpiry_secs = 60\n").unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.max_disk_bytes, 1024);
        assert_eq!(config.cache_config().expiry, Duration::from_secs(60));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.maintain_on_start);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            cache_dir: Some(dir.path().join("images")),
            memory_capacity: NonZeroUsize::new(7).unwrap(),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.resolved_cache_dir().unwrap(), dir.path().join("images"));
    }

    #[test]
    fn test_zero_memory_capacity_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "memory_capacity = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
