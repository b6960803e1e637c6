//! Configuration management

use crate::core::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub index: IndexConfig,
    pub ignore: IgnoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory override; defaults to the repoctx home
    pub dir: Option<PathBuf>,
    /// Entry time-to-live in hours
    pub ttl_hours: u64,
    /// Compactor sweep interval in seconds
    pub compact_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Worker cap; 0 means available hardware parallelism
    pub max_concurrency: usize,
    /// Maximum file size to analyze (bytes)
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Extra directory basenames dropped before analysis
    pub dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            index: IndexConfig::default(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_hours: 72,
            compact_interval_secs: 3600,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            max_file_size: 1_048_576, // 1MB
        }
    }
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self { dirs: Vec::new() }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = Self::repoctx_home()?;
        Ok(home.join("config.toml"))
    }

    /// Get the repoctx home directory
    pub fn repoctx_home() -> Result<PathBuf> {
        // Check REPOCTX_HOME env var first
        if let Ok(home) = std::env::var("REPOCTX_HOME") {
            return Ok(PathBuf::from(home));
        }

        // Use XDG directories
        ProjectDirs::from("dev", "repoctx", "repoctx")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| Error::Config {
                message: "Could not determine repoctx home directory".to_string(),
            })
    }

    /// Get the cache directory for a repository root
    pub fn cache_dir(&self, repo_root: &Path) -> Result<PathBuf> {
        let base = match &self.cache.dir {
            Some(dir) => dir.clone(),
            None => Self::repoctx_home()?,
        };
        let hash = xxhash_rust::xxh3::xxh3_64(repo_root.to_string_lossy().as_bytes());
        Ok(base.join("cache").join(format!("{:016x}", hash)))
    }

    /// Resolved worker count for the index engine
    pub fn concurrency(&self) -> usize {
        if self.index.max_concurrency > 0 {
            return self.index.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.ttl_hours, 72);
        assert_eq!(config.index.max_file_size, 1_048_576);
        assert!(config.concurrency() >= 1);
    }

    #[test]
    fn test_cache_dir_is_namespaced_by_root() {
        let config = Config {
            cache: CacheConfig {
                dir: Some(PathBuf::from("/tmp/repoctx-test")),
                ..CacheConfig::default()
            },
            ..Config::default()
        };
        let a = config.cache_dir(Path::new("/repo/a")).unwrap();
        let b = config.cache_dir(Path::new("/repo/b")).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("/tmp/repoctx-test/cache"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str("[cache]\nttl_hours = 12\n").unwrap();
        assert_eq!(config.cache.ttl_hours, 12);
        assert_eq!(config.index.max_concurrency, 0);
    }
}
