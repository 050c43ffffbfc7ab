//! Cache performance counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counters, bumped from the hot path and by the maintainer.
#[derive(Default)]
pub(crate) struct Counters {
	pub(crate) hits: AtomicU64,
	pub(crate) misses: AtomicU64,
	pub(crate) sets: AtomicU64,
	pub(crate) deletes: AtomicU64,
	pub(crate) evictions: AtomicU64,
	pub(crate) dropped_promotions: AtomicU64,
}

impl Counters {
	pub(crate) fn snapshot(&self) -> CacheMetrics {
		CacheMetrics {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			sets: self.sets.load(Ordering::Relaxed),
			deletes: self.deletes.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			dropped_promotions: self.dropped_promotions.load(Ordering::Relaxed),
		}
	}
}

/// A point-in-time snapshot of cache activity.
///
/// Counters are cumulative since construction. The snapshot is taken without
/// pausing the cache, so the fields may be mutually inconsistent by a few
/// operations under load.
///
/// # Example
///
/// ```
/// use layered_cache::LayeredCache;
///
/// let cache: LayeredCache<String> = LayeredCache::new(1024);
/// // ... perform cache operations ...
///
/// let metrics = cache.metrics();
/// println!("Hit rate: {:.2}%", metrics.hit_rate() * 100.0);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
	/// Lookups that found an item (possibly expired).
	pub hits: u64,
	/// Lookups that found nothing.
	pub misses: u64,
	/// Inserts and replacements.
	pub sets: u64,
	/// Items removed through the delete operations.
	pub deletes: u64,
	/// Items removed by the eviction pass.
	pub evictions: u64,
	/// Recency updates dropped because the promotions queue was full.
	pub dropped_promotions: u64,
}

impl CacheMetrics {
	/// Hit rate as a ratio between 0.0 and 1.0; 0.0 before any access.
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}

	/// Total lookups, hits plus misses.
	pub fn total_accesses(&self) -> u64 {
		self.hits + self.misses
	}
}
