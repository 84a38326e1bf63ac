//! Time-boxed lookup cache.
//!
//! Entries are JSON files `{timestamp, data}` under the data directory, one
//! per key, named with a fixed prefix plus the SHA-256 of the caller's key.
//! The cache performs no key normalization — callers derive keys (e.g. a
//! lowercased location string). A stale entry is treated as absent and
//! evicted on the next read. The cache is a pure optimization: every storage
//! failure is logged and degrades to a miss, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Filename prefix for cache entries.
const CACHE_PREFIX: &str = "flowdesk-cache-";

/// Entries older than this are stale (10 minutes).
pub const CACHE_TTL_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// Unix epoch milliseconds at write time.
    timestamp: i64,
    data: T,
}

#[derive(Debug, Clone)]
pub struct TtlCache {
    dir: PathBuf,
    ttl_ms: i64,
}

impl TtlCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            log::warn!("Failed to create cache directory {}: {}", dir.display(), e);
        }
        Self {
            dir,
            ttl_ms: CACHE_TTL_MS,
        }
    }

    #[cfg(test)]
    fn with_ttl(dir: impl Into<PathBuf>, ttl_ms: i64) -> Self {
        let mut cache = Self::new(dir);
        cache.ttl_ms = ttl_ms;
        cache
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}{}.json", CACHE_PREFIX, hex::encode(digest)))
    }

    /// Store `data` under `key` with the current timestamp.
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        let entry = CacheEntry {
            timestamp: Utc::now().timestamp_millis(),
            data,
        };
        let path = self.entry_path(key);
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    log::warn!("Failed to write cache entry for '{}': {}", key, e);
                }
            }
            Err(e) => log::warn!("Failed to serialize cache entry for '{}': {}", key, e),
        }
    }

    /// Fetch `key` if present and fresh. Stale entries are deleted and
    /// reported as absent; unreadable entries are a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Failed to read cache entry for '{}': {}", key, e);
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Discarding unreadable cache entry for '{}': {}", key, e);
                remove_entry(&path);
                return None;
            }
        };

        if Utc::now().timestamp_millis() - entry.timestamp > self.ttl_ms {
            remove_entry(&path);
            return None;
        }

        Some(entry.data)
    }
}

fn remove_entry(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Failed to evict cache entry {}: {}", path.display(), e);
    }
}
