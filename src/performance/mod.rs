//! Bounded check-result caches

pub mod cache;

pub use cache::{CacheKey, CacheStats, CachedDict, CachedSet, Footprint};
