//! # depscan-cache
//!
//! Content-addressed memoization of per-file extraction results.
//!
//! Entries are keyed by absolute path and validated against the
//! SHA-256 of the file's current content, so a cache hit requires the
//! file to be byte-identical to what was extracted. Entries also age
//! out after a staleness window (seven days by default). The whole
//! table persists as a single JSON map under the per-user cache
//! directory and is rewritten atomically after every update.

#![warn(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use depscan_core::{Dependency, Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default staleness window: seven days.
pub const DEFAULT_MAX_AGE_DAYS: i64 = 7;

const CACHE_FILE: &str = "cache.json";

/// One memoized extraction result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// SHA-256 of the file content the records were extracted from.
    pub hash: String,
    /// When the entry was stored.
    pub update_time: DateTime<Utc>,
    /// The extraction output.
    pub dependencies: Vec<Dependency>,
}

/// Content-addressed extraction cache.
///
/// Reads take the lock shared; `set`, eviction, and validation take
/// it exclusively. Persistence failures on `set` are logged and never
/// fail the caller: caching is best-effort.
pub struct DependencyCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
    dir: PathBuf,
    max_age: Duration,
}

/// SHA-256 of a file's current content, hex-encoded.
pub fn hash_file(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("depscan")
}

impl DependencyCache {
    /// Open (or create) the cache in the per-user cache directory.
    pub fn new() -> Self {
        Self::with_dir(default_cache_dir())
    }

    /// Open (or create) a cache rooted at `dir`. Tests point this at a
    /// temporary directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        let cache = Self {
            entries: RwLock::new(HashMap::new()),
            dir: dir.into(),
            max_age: Duration::days(DEFAULT_MAX_AGE_DAYS),
        };
        cache.load();
        cache
    }

    /// Override the staleness window.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    fn cache_file(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    fn load(&self) {
        let path = self.cache_file();
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to read cache file");
                return;
            }
        };
        match serde_json::from_str::<HashMap<PathBuf, CacheEntry>>(&content) {
            Ok(loaded) => *self.entries.write() = loaded,
            Err(e) => warn!(file = %path.display(), error = %e, "discarding corrupt cache file"),
        }
    }

    /// Persist the table atomically: write a temporary file in the
    /// cache directory, then rename it over the previous one.
    fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let entries = self.entries.read();
        let data = serde_json::to_vec_pretty(&*entries)
            .map_err(|e| Error::schema(self.cache_file(), e.to_string()))?;
        drop(entries);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::io(&self.dir, e))?;
        tmp.write_all(&data).map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(self.cache_file())
            .map_err(|e| Error::io(self.cache_file(), e.error))?;
        Ok(())
    }

    fn save_best_effort(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to persist cache");
        }
    }

    /// Records for `path`, iff a stored entry matches the file's
    /// current content hash and is younger than the staleness window.
    pub fn get(&self, path: &Path) -> Option<Vec<Dependency>> {
        let hash = hash_file(path).ok()?;
        let entries = self.entries.read();
        let entry = entries.get(path)?;
        if entry.hash != hash {
            return None;
        }
        if Utc::now() - entry.update_time > self.max_age {
            return None;
        }
        Some(entry.dependencies.clone())
    }

    /// Store the extraction result for `path`, hashing the file's
    /// current content, and persist the table.
    pub fn set(&self, path: &Path, dependencies: Vec<Dependency>) -> Result<()> {
        let hash = hash_file(path)?;
        self.entries.write().insert(
            path.to_path_buf(),
            CacheEntry {
                hash,
                update_time: Utc::now(),
                dependencies,
            },
        );
        self.save()
    }

    /// Drop every entry and remove the persisted file.
    pub fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        match std::fs::remove_file(self.cache_file()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(self.cache_file(), e)),
        }
    }

    /// Evict entries older than the staleness window; returns how many
    /// were removed.
    pub fn remove_expired(&self) -> usize {
        let now = Utc::now();
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, entry| now - entry.update_time <= self.max_age);
            before - entries.len()
        };
        if removed > 0 {
            debug!(removed, "evicted expired cache entries");
            self.save_best_effort();
        }
        removed
    }

    /// Re-hash every referenced path; evict entries whose file is gone
    /// or whose content changed.
    pub fn validate(&self) -> Result<()> {
        {
            let mut entries = self.entries.write();
            entries.retain(|path, entry| match hash_file(path) {
                Ok(hash) => hash == entry.hash,
                Err(_) => false,
            });
        }
        self.save()
    }

    /// `(entry_count, bytes_on_disk)` of the persisted table.
    pub fn stats(&self) -> (usize, u64) {
        let count = self.entries.read().len();
        let size = std::fs::metadata(self.cache_file())
            .map(|m| m.len())
            .unwrap_or(0);
        (count, size)
    }
}

impl Default for DependencyCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str) -> Dependency {
        let mut dep = Dependency::new(name, "cmake");
        dep.kind = "package".to_string();
        dep
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let cache = DependencyCache::with_dir(dir.path().join("cache"));
        let file = write_file(dir.path(), "CMakeLists.txt", "find_package(Boost)");

        cache.set(&file, vec![record("Boost")]).unwrap();
        let hit = cache.get(&file).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].name, "Boost");
    }

    #[test]
    fn content_change_invalidates() {
        let dir = TempDir::new().unwrap();
        let cache = DependencyCache::with_dir(dir.path().join("cache"));
        let file = write_file(dir.path(), "CMakeLists.txt", "find_package(Boost)");

        cache.set(&file, vec![record("Boost")]).unwrap();
        std::fs::write(&file, "find_package(OpenCV)").unwrap();
        assert!(cache.get(&file).is_none());
    }

    #[test]
    fn touching_without_changing_content_still_hits() {
        let dir = TempDir::new().unwrap();
        let cache = DependencyCache::with_dir(dir.path().join("cache"));
        let file = write_file(dir.path(), "Makefile", "LIBS = -lm");

        cache.set(&file, vec![record("m")]).unwrap();
        // Rewrite identical bytes: mtime moves, the hash does not.
        std::fs::write(&file, "LIBS = -lm").unwrap();
        assert!(cache.get(&file).is_some());
    }

    #[test]
    fn stale_entries_miss_and_evict() {
        let dir = TempDir::new().unwrap();
        let cache =
            DependencyCache::with_dir(dir.path().join("cache")).with_max_age(Duration::zero());
        let file = write_file(dir.path(), "Makefile", "LIBS = -lz");

        cache.set(&file, vec![record("z")]).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get(&file).is_none());
        assert_eq!(cache.remove_expired(), 1);
        assert_eq!(cache.stats().0, 0);
    }

    #[test]
    fn persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let file = write_file(dir.path(), "Makefile", "LIBS = -lm");

        {
            let cache = DependencyCache::with_dir(&cache_dir);
            cache.set(&file, vec![record("m")]).unwrap();
        }
        let reopened = DependencyCache::with_dir(&cache_dir);
        assert!(reopened.get(&file).is_some());
    }

    #[test]
    fn clear_removes_table_and_file() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join("cache");
        let cache = DependencyCache::with_dir(&cache_dir);
        let file = write_file(dir.path(), "Makefile", "LIBS = -lm");

        cache.set(&file, vec![record("m")]).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.stats(), (0, 0));
        assert!(!cache_dir.join(CACHE_FILE).exists());
    }

    #[test]
    fn validate_drops_deleted_and_changed_files() {
        let dir = TempDir::new().unwrap();
        let cache = DependencyCache::with_dir(dir.path().join("cache"));
        let kept = write_file(dir.path(), "keep", "same");
        let changed = write_file(dir.path(), "changed", "before");
        let deleted = write_file(dir.path(), "deleted", "gone");

        cache.set(&kept, vec![record("a")]).unwrap();
        cache.set(&changed, vec![record("b")]).unwrap();
        cache.set(&deleted, vec![record("c")]).unwrap();

        std::fs::write(&changed, "after").unwrap();
        std::fs::remove_file(&deleted).unwrap();
        cache.validate().unwrap();

        assert!(cache.get(&kept).is_some());
        assert_eq!(cache.stats().0, 1);
    }

    #[test]
    fn concurrent_sets_on_distinct_keys() {
        let dir = TempDir::new().unwrap();
        let cache = std::sync::Arc::new(DependencyCache::with_dir(dir.path().join("cache")));

        let files: Vec<PathBuf> = (0..8)
            .map(|i| write_file(dir.path(), &format!("f{i}.pc"), &format!("Name: pkg{i}")))
            .collect();

        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                let cache = std::sync::Arc::clone(&cache);
                let file = file.clone();
                std::thread::spawn(move || {
                    let name = file.file_stem().unwrap().to_string_lossy().into_owned();
                    cache.set(&file, vec![record(&name)]).unwrap();
                    assert!(cache.get(&file).is_some());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.stats().0, 8);
        for file in &files {
            assert!(cache.get(file).is_some());
        }
    }
}
