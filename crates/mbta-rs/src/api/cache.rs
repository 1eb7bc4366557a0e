//! Response cache keyed by request fingerprint.
//!
//! Every entry belongs to a [`ResourceKind`] and obeys that kind's
//! [`CachePolicy`]: an entry older than the TTL is never returned (it is
//! evicted on the lookup that finds it stale), and inserting into a kind at
//! capacity first evicts that kind's least-recently-used entry.
//!
//! Ages are measured with [`tokio::time::Instant`] so tests can drive expiry
//! with a paused clock.

use super::fingerprint::Fingerprint;
use crate::config::CachePolicies;
use crate::model::ResourceKind;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    kind: ResourceKind,
    inserted: Instant,
    /// Logical clock tick of the most recent read or write.
    last_used: u64,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<Fingerprint, CacheEntry<V>>,
    tick: u64,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters and occupancy, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe TTL + LRU cache of decoded responses.
#[derive(Debug)]
pub struct ResponseCache<V> {
    policies: CachePolicies,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(policies: CachePolicies) -> Self {
        Self {
            policies,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                tick: 0,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Look up a fresh entry. A stale entry is removed and reported as a miss.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<V> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tick += 1;
        let tick = state.tick;

        let fresh = match state.entries.get_mut(fingerprint) {
            Some(entry) if entry.inserted.elapsed() < self.policies.get(entry.kind).ttl => {
                entry.last_used = tick;
                Some(entry.value.clone())
            }
            Some(_) => {
                state.entries.remove(fingerprint);
                debug!(key = %fingerprint, "Cache entry expired");
                None
            }
            None => None,
        };

        if fresh.is_some() {
            state.hits += 1;
            trace!(key = %fingerprint, "Cache hit");
        } else {
            state.misses += 1;
            trace!(key = %fingerprint, "Cache miss");
        }
        fresh
    }

    /// Store a value under the policy of `kind`.
    pub fn put(&self, fingerprint: Fingerprint, value: V, kind: ResourceKind) {
        let policy = self.policies.get(kind);
        if policy.max_entries == 0 || policy.ttl.is_zero() {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.tick += 1;
        let tick = state.tick;

        if !state.entries.contains_key(&fingerprint) {
            let resident = state.entries.values().filter(|e| e.kind == kind).count();
            if resident >= policy.max_entries {
                evict_least_recent(&mut state.entries, kind);
            }
        }

        state.entries.insert(
            fingerprint,
            CacheEntry {
                value,
                kind,
                inserted: Instant::now(),
                last_used: tick,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

fn evict_least_recent<V>(entries: &mut HashMap<Fingerprint, CacheEntry<V>>, kind: ResourceKind) {
    if let Some(victim) = entries
        .iter()
        .filter(|(_, e)| e.kind == kind)
        .min_by_key(|(_, e)| e.last_used)
        .map(|(k, _)| k.clone())
    {
        debug!(key = %victim, %kind, "Evicting least recently used cache entry");
        entries.remove(&victim);
    }
}
