//! TTL cache for resolved station lists, keyed by normalized query.
//!
//! Entries are replaced wholesale on `set`, never mutated. Expired entries
//! are evicted lazily on `get` and in bulk by a background sweep, so keys
//! that are written once and never read again do not accumulate.

use crate::query::CacheKey;
use crate::utils::truncate_str;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// TTL used by the search pipeline unless configured otherwise.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// How often the background sweep runs unless configured otherwise.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Longest TTL an entry can carry; longer requests are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const STATS_KEY_LEN: usize = 50;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Point-in-time view of the store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    /// Keys truncated to 50 characters.
    pub keys: Vec<String>,
}

/// In-memory key→value store with per-entry TTL. Clone-cheap.
///
/// `V` is handed out by clone on every hit, so store an `Arc` for anything
/// larger than a handful of bytes.
#[derive(Clone)]
pub struct CacheStore<V> {
    entries: Arc<DashMap<String, CacheEntry<V>>>,
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> CacheStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value for `key` if present and fresh.
    ///
    /// An expired entry is removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let entry = self.entries.get(key.as_str())?;
        if !entry.is_expired(now) {
            debug!(key = key.short(), "cache hit");
            return Some(entry.value.clone());
        }
        // Release the read guard before taking the shard's write lock.
        drop(entry);

        // Only evict if the entry is still the expired one; a concurrent `set`
        // may have replaced it in between.
        if self
            .entries
            .remove_if(key.as_str(), |_, e| e.is_expired(now))
            .is_some()
        {
            debug!(key = key.short(), "cache entry expired");
        }
        None
    }

    /// Store `value` under `key`, replacing any prior entry. `ttl` is
    /// clamped to [`MAX_TTL`].
    pub fn set(&self, key: &CacheKey, value: V, ttl: Duration) {
        let ttl = ttl.min(MAX_TTL);
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: now.checked_add(ttl).unwrap_or(now),
        };
        self.entries.insert(key.as_str().to_owned(), entry);
        debug!(
            key = key.short(),
            ttl_secs = ttl.as_secs_f64(),
            "cache set"
        );
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            keys: self
                .entries
                .iter()
                .map(|e| truncate_str(e.key(), STATS_KEY_LEN).to_owned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a background task that sweeps expired entries every `interval`.
    /// The task runs until aborted or the runtime shuts down.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // skip the immediate first tick
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    info!(
                        removed,
                        remaining = store.len(),
                        "swept expired cache entries"
                    );
                }
            }
        })
    }
}
