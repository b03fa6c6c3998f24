//! Memory-bounded memo structures for successful argument checks
//!
//! Both containers estimate their own footprint and clear themselves
//! completely before an insertion once the estimate exceeds the budget.
//! Correctness never depends on an entry being present.

use crate::core::value::Value;
use crate::runtime::function::CallArgs;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::mem::size_of;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Bytes per megabyte of cache budget
pub const BYTES_PER_MB: usize = 1_000_000;

/// Table slot overhead charged per entry on top of its own footprint
const SLOT_OVERHEAD: usize = 16;

/// Approximate heap plus inline size of a cached item
pub trait Footprint {
    fn footprint(&self) -> usize;
}

impl Footprint for String {
    fn footprint(&self) -> usize {
        size_of::<String>() + self.capacity()
    }
}

impl Footprint for Value {
    fn footprint(&self) -> usize {
        let nested = match self {
            Value::Str(s) => s.capacity(),
            Value::Bytes(b) | Value::ByteArray(b) => b.capacity(),
            Value::List(items) | Value::Tuple(items) | Value::Set(items) => {
                items.iter().map(Footprint::footprint).sum()
            }
            Value::Dict(entries) => entries.iter().map(|(k, v)| k.footprint() + v.footprint()).sum(),
            Value::Type(name) => name.capacity(),
            _ => 0,
        };
        size_of::<Value>() + nested
    }
}

/// Content hash of one call's arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Hash the callee identity and the repr of every argument.
    ///
    /// Each component is length-prefixed, so argument boundaries cannot be
    /// forged by values whose repr contains separators.
    pub fn for_call(identity: &str, args: &CallArgs) -> Self {
        let mut hasher = blake3::Hasher::new();
        let mut feed = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        feed(identity.as_bytes());
        for value in args.args() {
            feed(value.to_string().as_bytes());
        }
        feed(b"**");
        for (name, value) in args.kwargs() {
            feed(name.as_bytes());
            feed(value.to_string().as_bytes());
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = blake3::Hash::from(self.0);
        f.write_str(&hash.to_hex().as_str()[..16])
    }
}

impl Footprint for CacheKey {
    fn footprint(&self) -> usize {
        size_of::<CacheKey>()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    /// Number of full clears triggered by the memory budget
    pub flushes: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared bookkeeping for both containers
struct Budget {
    limit: usize,
    estimated: AtomicUsize,
    stats: RwLock<CacheStats>,
}

impl Budget {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            estimated: AtomicUsize::new(0),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    fn over_limit(&self) -> bool {
        self.estimated.load(Ordering::Relaxed) > self.limit
    }

    fn record_lookup(&self, hit: bool) {
        let mut stats = self.stats.write();
        if hit {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
    }

    fn charge(&self, bytes: usize) {
        self.estimated.fetch_add(bytes + SLOT_OVERHEAD, Ordering::Relaxed);
        self.stats.write().inserts += 1;
    }

    fn reset(&self, flushed: bool) {
        self.estimated.store(0, Ordering::Relaxed);
        if flushed {
            self.stats.write().flushes += 1;
        }
    }
}

/// Set that forgets everything once it grows past its budget
pub struct CachedSet<K: Eq + Hash> {
    entries: DashSet<K>,
    budget: Budget,
}

impl<K: Eq + Hash + Footprint> CachedSet<K> {
    /// Budget given in megabytes
    pub fn new(memory_limit_mb: usize) -> Self {
        Self::with_limit_bytes(memory_limit_mb.saturating_mul(BYTES_PER_MB))
    }

    pub fn with_limit_bytes(limit: usize) -> Self {
        Self {
            entries: DashSet::new(),
            budget: Budget::new(limit),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        let hit = self.entries.contains(key);
        self.budget.record_lookup(hit);
        hit
    }

    pub fn insert(&self, key: K) {
        if self.budget.over_limit() {
            debug!(entries = self.entries.len(), limit = self.budget.limit, "cache over budget, clearing");
            self.entries.clear();
            self.budget.reset(true);
        }
        let bytes = key.footprint();
        if self.entries.insert(key) {
            self.budget.charge(bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.budget.reset(false);
    }

    /// Estimated bytes held
    pub fn footprint(&self) -> usize {
        self.budget.estimated.load(Ordering::Relaxed)
    }

    pub fn memory_limit(&self) -> usize {
        self.budget.limit
    }

    pub fn stats(&self) -> CacheStats {
        *self.budget.stats.read()
    }
}

/// Map counterpart of `CachedSet`
pub struct CachedDict<K: Eq + Hash, V> {
    entries: DashMap<K, V>,
    budget: Budget,
}

impl<K: Eq + Hash + Footprint, V: Clone + Footprint> CachedDict<K, V> {
    pub fn new(memory_limit_mb: usize) -> Self {
        Self::with_limit_bytes(memory_limit_mb.saturating_mul(BYTES_PER_MB))
    }

    pub fn with_limit_bytes(limit: usize) -> Self {
        Self {
            entries: DashMap::new(),
            budget: Budget::new(limit),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.entries.get(key).map(|r| r.value().clone());
        self.budget.record_lookup(found.is_some());
        found
    }

    pub fn insert(&self, key: K, value: V) {
        if self.budget.over_limit() {
            debug!(entries = self.entries.len(), limit = self.budget.limit, "cache over budget, clearing");
            self.entries.clear();
            self.budget.reset(true);
        }
        let bytes = key.footprint() + value.footprint();
        if self.entries.insert(key, value).is_none() {
            self.budget.charge(bytes);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.budget.reset(false);
    }

    pub fn footprint(&self) -> usize {
        self.budget.estimated.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        *self.budget.stats.read()
    }
}
