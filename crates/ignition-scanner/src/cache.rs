//! Time-bounded cache of project scan results.

use crate::types::ProjectScanResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time-to-live of a cached scan
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Cached scan with expiration
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: Arc<ProjectScanResult>,
    /// When the entry was written
    pub last_modified: DateTime<Utc>,
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Cache statistics for observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    /// Approximate size: sum of JSON byte lengths
    pub total_size: usize,
    /// Hit rate in percent
    pub hit_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Scan results keyed by canonical project path
///
/// TTL runs from write time; reads do not extend it. Hit and miss counters
/// are cumulative and survive [`ScanCache::clear`].
#[derive(Debug)]
pub struct ScanCache {
    entries: DashMap<PathBuf, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry, counting the hit or miss
    pub fn get(&self, path: &Path) -> Option<Arc<ProjectScanResult>> {
        let now = Instant::now();
        let lookup = self
            .entries
            .get(path)
            .map(|entry| (entry.is_live(now), Arc::clone(&entry.result)));
        let live = match lookup {
            Some((true, result)) => Some(result),
            Some((false, _)) => {
                self.entries.remove_if(path, |_, entry| !entry.is_live(now));
                None
            }
            None => None,
        };

        match live {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Live entry without counting a hit or miss
    pub fn peek(&self, path: &Path) -> Option<Arc<ProjectScanResult>> {
        let now = Instant::now();
        self.entries
            .get(path)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.result))
    }

    /// Store a result under its project path
    pub fn insert(&self, result: Arc<ProjectScanResult>) {
        let entry = CacheEntry {
            result: Arc::clone(&result),
            last_modified: Utc::now(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(result.project_path.clone(), entry);
    }

    /// Remove one entry; returns whether it existed
    pub fn invalidate(&self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Remove every entry whose inheritance chain names `project`
    pub fn invalidate_inheritors(&self, project: &str) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        self.entries.retain(|path, entry| {
            let inherits = entry.result.inheritance_chain.iter().any(|n| n == project);
            if inherits {
                removed.push(path.clone());
            }
            !inherits
        });
        removed
    }

    /// Drop all entries, keeping the counters
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Live results, without touching the counters
    pub fn live_results(&self) -> Vec<Arc<ProjectScanResult>> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.result))
            .collect()
    }

    /// Evict expired entries
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        let mut total_size = 0;
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;

        for entry in &self.entries {
            total_size += serde_json::to_vec(entry.result.as_ref()).map_or(0, |v| v.len());
            let written = entry.last_modified;
            oldest = Some(oldest.map_or(written, |o| o.min(written)));
            newest = Some(newest.map_or(written, |n| n.max(written)));
        }

        let hits = self.hits();
        let misses = self.misses();
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64 * 100.0
        };

        CacheStats {
            entries: self.entries.len(),
            total_size,
            hit_rate,
            cache_hits: hits,
            cache_misses: misses,
            oldest_entry: oldest,
            newest_entry: newest,
        }
    }
}

impl Default for ScanCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProjectMetadata;
    use std::thread;

    fn result(path: &str, chain: &[&str]) -> Arc<ProjectScanResult> {
        Arc::new(ProjectScanResult {
            project_path: PathBuf::from(path),
            project_name: path.to_string(),
            metadata: ProjectMetadata::default(),
            resources: Vec::new(),
            inheritance_chain: chain.iter().map(|s| (*s).to_string()).collect(),
            inherited_resources: Vec::new(),
            scan_time: 0,
            resource_count: 0,
            warnings: Vec::new(),
            last_scanned: Utc::now(),
        })
    }

    #[test]
    fn test_cache_basic() {
        let cache = ScanCache::new(Duration::from_secs(60));
        cache.insert(result("/p/a", &[]));

        assert!(cache.get(Path::new("/p/a")).is_some());
        assert!(cache.get(Path::new("/p/b")).is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_cache_expiration() {
        let cache = ScanCache::new(Duration::from_millis(50));
        cache.insert(result("/p/a", &[]));
        assert!(cache.get(Path::new("/p/a")).is_some());

        thread::sleep(Duration::from_millis(80));
        assert!(cache.live_results().is_empty());
        assert!(cache.get(Path::new("/p/a")).is_none());
        assert_eq!(cache.misses(), 1);
        assert!(cache.is_empty(), "expired entry should be evicted on lookup");
    }

    #[test]
    fn test_clear_keeps_counters() {
        let cache = ScanCache::new(Duration::from_secs(60));
        cache.insert(result("/p/a", &[]));
        cache.insert(result("/p/b", &[]));
        cache.get(Path::new("/p/a"));

        assert_eq!(cache.len(), 2);
        cache.clear();
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_invalidate_and_inheritors() {
        let cache = ScanCache::new(Duration::from_secs(60));
        cache.insert(result("/p/Base", &[]));
        cache.insert(result("/p/child", &["Base"]));
        cache.insert(result("/p/other", &[]));

        let removed = cache.invalidate_inheritors("Base");
        assert_eq!(removed, vec![PathBuf::from("/p/child")]);
        assert!(cache.invalidate(Path::new("/p/Base")));
        assert!(!cache.invalidate(Path::new("/p/Base")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats() {
        let cache = ScanCache::new(Duration::from_secs(60));
        let empty = cache.stats();
        assert_eq!(empty.entries, 0);
        assert!(empty.oldest_entry.is_none());
        assert!((empty.hit_rate - 0.0).abs() < f64::EPSILON);

        cache.insert(result("/p/a", &[]));
        cache.get(Path::new("/p/a"));
        cache.get(Path::new("/p/a"));
        cache.get(Path::new("/p/a"));
        cache.get(Path::new("/p/missing"));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert!(stats.total_size > 0);
        assert_eq!(stats.cache_hits, 3);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.hit_rate - 75.0).abs() < 1e-9);
        assert!(stats.oldest_entry.is_some());
        assert_eq!(stats.oldest_entry, stats.newest_entry);
    }
}
