//! Scanner configuration
//!
//! A TOML file listing the project roots to scan plus cache, watch and
//! batching knobs. Every section is optional.

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{ScanError, ScanResult};
use crate::watcher::DEFAULT_DEBOUNCE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default number of projects scanned concurrently in a batch
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Contents of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Project roots, absolute or relative to the config file
    pub projects: Vec<PathBuf>,
    pub cache: CacheSection,
    pub watch: WatchSection,
    pub scan: ScanSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: u64::try_from(DEFAULT_DEBOUNCE.as_millis()).unwrap_or(1000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    pub batch_size: usize,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ScannerConfig {
    /// Load a config file, resolving project paths against its directory
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or is invalid
    pub fn load(path: &Path) -> ScanResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    /// Parse config text, resolving relative project paths against `base`
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or a value is out of range
    pub fn parse(content: &str, base: &Path) -> ScanResult<Self> {
        let mut config: ScannerConfig = toml::from_str(content)?;
        config.validate()?;
        config.projects = config
            .projects
            .into_iter()
            .map(|p| if p.is_absolute() { p } else { base.join(p) })
            .collect();
        Ok(config)
    }

    fn validate(&self) -> ScanResult<()> {
        if self.scan.batch_size == 0 {
            return Err(ScanError::Config(
                "scan.batch_size must be at least 1".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ScanError::Config(
                "cache.ttl_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured project paths that exist on disk
    pub fn existing_projects(&self) -> Vec<PathBuf> {
        self.projects
            .iter()
            .filter(|p| {
                let exists = p.exists();
                if !exists {
                    warn!("Configured project path does not exist: {}", p.display());
                }
                exists
            })
            .cloned()
            .collect()
    }
}

/// Runtime knobs of the scan service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub cache_ttl: Duration,
    /// Arm a file watcher for every scanned project
    pub watch: bool,
    pub watch_debounce: Duration,
    /// Projects scanned concurrently by a batch scan
    pub batch_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            watch: true,
            watch_debounce: DEFAULT_DEBOUNCE,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    #[must_use]
    pub fn with_watch_debounce(mut self, debounce: Duration) -> Self {
        self.watch_debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl From<&ScannerConfig> for ServiceConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            watch: config.watch.enabled,
            watch_debounce: Duration::from_millis(config.watch.debounce_ms),
            batch_size: config.scan.batch_size.max(1),
        }
    }
}
