//! File-based cache of `info.php` responses at ~/.nedra/info-cache.json.
//!
//! Keyed by location (exact). Entries older than the TTL are ignored but
//! left on disk until overwritten.

use crate::registry::LicenseInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MS_PER_DAY: i64 = 24 * 3600 * 1000;

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    payload: Value,
    timestamp: i64,
}

/// The response cache.
pub struct InfoCache {
    path: Option<PathBuf>,
    ttl_ms: i64,
    entries: HashMap<String, CacheEntry>,
}

impl InfoCache {
    /// Load from a specific path. A missing or unreadable file starts empty.
    pub fn load_from(path: PathBuf, ttl_days: u32) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        debug!(path = %path.display(), entries = entries.len(), "loaded info cache");
        Self {
            path: Some(path),
            ttl_ms: i64::from(ttl_days) * MS_PER_DAY,
            entries,
        }
    }

    /// A cache that never touches disk.
    pub fn in_memory(ttl_days: u32) -> Self {
        Self {
            path: None,
            ttl_ms: i64::from(ttl_days) * MS_PER_DAY,
            entries: HashMap::new(),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".nedra")
            .join("info-cache.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Cached info for a location. `None` if missing, expired or unreadable.
    pub fn get(&self, location: &str) -> Option<LicenseInfo> {
        let entry = self.entries.get(location)?;
        let now = chrono::Utc::now().timestamp_millis();
        if now - entry.timestamp > self.ttl_ms {
            return None;
        }
        serde_json::from_value(entry.payload.clone()).ok()
    }

    /// Store a raw response and persist.
    pub fn put(&mut self, location: &str, payload: Value) {
        self.entries.insert(
            location.to_string(),
            CacheEntry {
                payload,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        );
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!(path = %path.display(), error = %e, "could not write info cache");
                }
            }
            Err(e) => warn!(error = %e, "could not serialize info cache"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_cache() -> (InfoCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info-cache.json");
        (InfoCache::load_from(path, 7), dir)
    }

    #[test]
    fn test_cache_put_get() {
        let (mut cache, _dir) = test_cache();
        cache.put("4471", json!({"nlicense": "12-ТПИ", "deposit": "Малеевское"}));

        let info = cache.get("4471").unwrap();
        assert_eq!(info.nlicense.as_deref(), Some("12-ТПИ"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let (cache, _dir) = test_cache();
        assert!(cache.get("nothing").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("info-cache.json");

        {
            let mut cache = InfoCache::load_from(path.clone(), 7);
            cache.put("900", json!({"deposit": "Риддер"}));
        }

        let reloaded = InfoCache::load_from(path, 7);
        assert_eq!(reloaded.get("900").unwrap().deposit.as_deref(), Some("Риддер"));
    }

    #[test]
    fn test_expired_entry_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("info-cache.json");
        fs::write(&path, r#"{"old": {"payload": {"deposit": "x"}, "timestamp": 0}}"#).unwrap();

        let cache = InfoCache::load_from(path, 7);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("old").is_none());
    }

    #[test]
    fn test_in_memory_never_writes() {
        let mut cache = InfoCache::in_memory(1);
        cache.put("1", json!({}));
        assert!(cache.get("1").is_some());
    }
}
