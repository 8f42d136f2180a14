/// Smart cache — bounded, TTL'd, LRU-evicted store with file-hash
/// invalidation.
///
/// Entries referencing a file carry a fast fingerprint (`mtime_ms + "-" +
/// size`); a fingerprint mismatch on `get` invalidates the entry so stale
/// parses never survive an edit. Capacity is bounded both by entry count and
/// estimated memory; both invariants hold after every mutating operation.
/// The store sits behind a mutex so the process-wide instance can be shared.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

// ── Configuration ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_memory_bytes: usize,
    pub default_ttl_ms: u64,
    /// Expiration sweep runs every this many operations.
    pub cleanup_interval: u64,
    pub validate_file_hashes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_memory_bytes: 50 * 1024 * 1024,
            default_ttl_ms: 30 * 60 * 1000,
            cleanup_interval: 50,
            validate_file_hashes: true,
        }
    }
}

// ── Entry and results ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    created_at: Instant,
    last_accessed_at: Instant,
    ttl: Duration,
    file_path: Option<PathBuf>,
    file_hash: Option<String>,
    size_bytes: usize,
    token_count: Option<usize>,
}

impl<T> CacheEntry<T> {
    fn expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    NotFound,
    Expired,
    FileChanged,
    Evicted,
}

#[derive(Debug, Clone)]
pub enum Lookup<T> {
    Hit(T),
    Miss(MissReason),
}

impl<T> Lookup<T> {
    pub fn hit(self) -> Option<T> {
        match self {
            Self::Hit(v) => Some(v),
            Self::Miss(_) => None,
        }
    }

    pub fn miss_reason(&self) -> Option<MissReason> {
        match self {
            Self::Hit(_) => None,
            Self::Miss(r) => Some(*r),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub ttl_ms: Option<u64>,
    pub file_path: Option<PathBuf>,
    pub token_count: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    pub tokens_saved: u64,
    pub entries: usize,
    pub memory_size_bytes: usize,
    /// Percentage with one decimal: round(1000·hits/total)/10.
    pub hit_rate: f64,
}

// ── Fingerprint ───────────────────────────────────────────────────────────────

/// Fast file fingerprint: mtime in milliseconds and byte size. Cheap enough
/// to recompute on every get.
pub fn file_fingerprint(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    let mtime_ms = meta
        .modified()
        .ok()?
        .duration_since(std::time::UNIX_EPOCH)
        .ok()?
        .as_millis();
    Some(format!("{}-{}", mtime_ms, meta.len()))
}

/// Estimated footprint: twice the serialized length, 1024 on failure.
fn estimate_size<T: Serialize>(value: &T) -> usize {
    serde_json::to_string(value).map(|s| 2 * s.len()).unwrap_or(1024)
}

// ── Cache ─────────────────────────────────────────────────────────────────────

struct Inner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    evicted_keys: HashSet<String>,
    memory_bytes: usize,
    ops: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    invalidations: u64,
    tokens_saved: u64,
}

pub struct SmartCache<T> {
    config: CacheConfig,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone + Serialize> SmartCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                evicted_keys: HashSet::new(),
                memory_bytes: 0,
                ops: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
                invalidations: 0,
                tokens_saved: 0,
            }),
        }
    }

    /// Insert a value. Capacity and memory bounds are restored before the
    /// lock is released.
    pub fn set(&self, key: &str, value: T, options: SetOptions) {
        let size_bytes = estimate_size(&value);
        let file_hash = options
            .file_path
            .as_deref()
            .and_then(file_fingerprint);
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            last_accessed_at: Instant::now(),
            ttl: Duration::from_millis(options.ttl_ms.unwrap_or(self.config.default_ttl_ms)),
            file_path: options.file_path,
            file_hash,
            size_bytes,
            token_count: options.token_count,
        };

        let mut inner = self.inner.lock().unwrap();
        inner.ops += 1;
        if let Some(old) = inner.entries.insert(key.to_string(), entry) {
            inner.memory_bytes -= old.size_bytes;
        }
        inner.memory_bytes += size_bytes;
        inner.evicted_keys.remove(key);
        self.enforce_bounds(&mut inner);
        self.maybe_sweep(&mut inner);
    }

    pub fn get(&self, key: &str) -> Lookup<T> {
        let mut inner = self.inner.lock().unwrap();
        inner.ops += 1;
        self.maybe_sweep(&mut inner);

        let Some(entry) = inner.entries.get(key) else {
            inner.misses += 1;
            let reason = if inner.evicted_keys.contains(key) {
                MissReason::Evicted
            } else {
                MissReason::NotFound
            };
            return Lookup::Miss(reason);
        };

        if entry.expired() {
            let removed = inner.entries.remove(key).unwrap();
            inner.memory_bytes -= removed.size_bytes;
            inner.expirations += 1;
            inner.misses += 1;
            return Lookup::Miss(MissReason::Expired);
        }

        if self.config.validate_file_hashes {
            if let Some(path) = entry.file_path.clone() {
                let current = file_fingerprint(&path);
                if current != entry.file_hash {
                    tracing::debug!(key, path = %path.display(), "cache entry invalidated by file change");
                    let removed = inner.entries.remove(key).unwrap();
                    inner.memory_bytes -= removed.size_bytes;
                    inner.invalidations += 1;
                    inner.misses += 1;
                    return Lookup::Miss(MissReason::FileChanged);
                }
            }
        }

        let entry = inner.entries.get_mut(key).unwrap();
        entry.last_accessed_at = Instant::now();
        let value = entry.value.clone();
        let saved = entry.token_count.unwrap_or(0) as u64;
        inner.hits += 1;
        inner.tokens_saved += saved;
        Lookup::Hit(value)
    }

    /// Drop one key. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.ops += 1;
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.memory_bytes -= entry.size_bytes;
                inner.invalidations += 1;
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.evicted_keys.clear();
        inner.memory_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().unwrap();
        let total = inner.hits + inner.misses;
        let hit_rate = if total > 0 {
            (1000.0 * inner.hits as f64 / total as f64).round() / 10.0
        } else {
            0.0
        };
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            invalidations: inner.invalidations,
            tokens_saved: inner.tokens_saved,
            entries: inner.entries.len(),
            memory_size_bytes: inner.memory_bytes,
            hit_rate,
        }
    }

    /// Evict least-recently-used entries until both bounds hold.
    fn enforce_bounds(&self, inner: &mut Inner<T>) {
        while inner.entries.len() > self.config.max_entries
            || inner.memory_bytes > self.config.max_memory_bytes
        {
            let Some(oldest) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_accessed_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            let entry = inner.entries.remove(&oldest).unwrap();
            inner.memory_bytes -= entry.size_bytes;
            inner.evicted_keys.insert(oldest);
            inner.evictions += 1;
        }
    }

    fn maybe_sweep(&self, inner: &mut Inner<T>) {
        if inner.ops % self.config.cleanup_interval != 0 {
            return;
        }
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            let entry = inner.entries.remove(&key).unwrap();
            inner.memory_bytes -= entry.size_bytes;
            inner.expirations += 1;
        }
    }
}

impl<T: Clone + Serialize> Default for SmartCache<T> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
