//! Content fingerprints and the bounded fingerprint cache
//!
//! Hashing a file is the most expensive operation in the serving path and
//! identical concurrent requests for the same unmodified file are the common
//! case under load, so computations are coalesced: at most one digest runs
//! per file identity, and every concurrent requester observes its outcome.

use crate::error::ServeError;
use crate::fs::ResourceDescriptor;
use log::debug;
use lru::LruCache;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncReadExt;
use tokio::sync::OnceCell;

/// Default bound for the fingerprint cache
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

const HASH_BUF_SIZE: usize = 64 * 1024;

/// How ETags are produced for a route
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EtagMode {
    /// Content digest, cached and coalesced
    #[default]
    Hash,
    /// `hex(len)-hex(mtime_ms)`, pure computation
    Simple,
    /// No ETag at all
    Disabled,
}

/// File identity a fingerprint is valid for.
///
/// Any change to size or mtime changes the key, so stale fingerprints die
/// by natural invalidation rather than explicit eviction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    path: PathBuf,
    ino: u64,
    len: u64,
    mtime_ms: u128,
}

impl CacheKey {
    pub fn new(path: &Path, stat: &ResourceDescriptor) -> Self {
        Self {
            path: path.to_path_buf(),
            ino: stat.ino,
            len: stat.len,
            mtime_ms: stat.mtime_millis(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `hex(len)-hex(mtime_ms)` fingerprint, no I/O involved
pub fn simple_fingerprint(stat: &ResourceDescriptor) -> String {
    format!("{:x}-{:x}", stat.len, stat.mtime_millis())
}

type PendingCell = Arc<OnceCell<Result<String, Arc<io::Error>>>>;

/// Cache observability counters
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    computations: AtomicU64,
}

/// Point-in-time snapshot of [`FingerprintCache`] activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Fingerprints answered from the bounded cache
    pub hits: u64,
    /// Lookups that had to consult the pending table
    pub misses: u64,
    /// Requests that joined an in-flight computation instead of hashing
    pub coalesced: u64,
    /// Digest computations actually executed
    pub computations: u64,
}

/// Bounded fingerprint cache with request coalescing.
///
/// The pending table guarantees at most one digest per [`CacheKey`] is in
/// flight; checking and registering happen under a single mutex acquisition
/// with no await point in between, which is what makes the guarantee hold
/// under the cooperative scheduler. Coalescing is independent of storage:
/// it still applies with a zero-capacity cache.
pub struct FingerprintCache {
    entries: Mutex<Option<LruCache<CacheKey, String>>>,
    pending: Mutex<HashMap<CacheKey, PendingCell>>,
    counters: Counters,
}

impl std::fmt::Debug for FingerprintCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl FingerprintCache {
    /// Capacity 0 disables storage; coalescing stays on.
    pub fn new(capacity: usize) -> Self {
        let entries = NonZeroUsize::new(capacity).map(LruCache::new);
        Self {
            entries: Mutex::new(entries),
            pending: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
        }
    }

    /// Cached or freshly-computed content digest for `key`.
    ///
    /// All concurrent callers for the same key receive the same result,
    /// success or failure alike.
    pub async fn fingerprint(&self, key: CacheKey) -> Result<String, ServeError> {
        if let Some(tag) = self.lookup(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(tag);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let (cell, leader) = self.join_or_register(&key);
        if !leader {
            self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
        }

        let outcome = cell
            .get_or_init(|| {
                self.counters.computations.fetch_add(1, Ordering::Relaxed);
                hash_contents(key.path.clone())
            })
            .await
            .clone();

        if leader {
            if let Ok(tag) = &outcome {
                self.store(key.clone(), tag.clone());
            }
            self.unregister(&key);
        }

        outcome.map_err(|source| ServeError::Internal {
            path: key.path,
            source,
        })
    }

    fn lookup(&self, key: &CacheKey) -> Option<String> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.as_mut().and_then(|cache| cache.get(key).cloned())
    }

    fn store(&self, key: CacheKey, tag: String) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cache) = entries.as_mut() {
            cache.put(key, tag);
        }
    }

    /// Check the pending table and register in one atomic step. Returns the
    /// shared cell and whether this caller is the leader responsible for
    /// cleanup and cache insertion.
    fn join_or_register(&self, key: &CacheKey) -> (PendingCell, bool) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cell) = pending.get(key) {
            debug!("joining in-flight fingerprint for {}", key.path.display());
            return (Arc::clone(cell), false);
        }
        let cell: PendingCell = Arc::new(OnceCell::new());
        pending.insert(key.clone(), Arc::clone(&cell));
        (cell, true)
    }

    fn unregister(&self, key: &CacheKey) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl Default for FingerprintCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

/// Stream the whole file through a SHA-256 digest, hex-encoded.
///
/// The error is shared between all coalesced waiters, hence the `Arc`.
async fn hash_contents(path: PathBuf) -> Result<String, Arc<io::Error>> {
    let mut file = tokio::fs::File::open(&path).await.map_err(Arc::new)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let read = file.read(&mut buf).await.map_err(Arc::new)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
