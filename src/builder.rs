use crate::cache::LayeredCache;
use crate::item::Item;
use crate::traits::CacheValue;
use crate::worker::OnDelete;

/// Builder for configuring a [`LayeredCache`].
///
/// # Example
///
/// ```
/// use layered_cache::CacheBuilder;
///
/// let cache = CacheBuilder::<String>::new()
/// 	.max_size(512 * 1024)
/// 	.buckets(32)
/// 	.gets_per_promote(3)
/// 	.build();
/// # drop(cache);
/// ```
pub struct CacheBuilder<V> {
	pub(crate) max_size: u64,
	pub(crate) buckets: usize,
	pub(crate) items_to_prune: usize,
	pub(crate) gets_per_promote: i32,
	pub(crate) promote_buffer: usize,
	pub(crate) delete_buffer: usize,
	pub(crate) tracking: bool,
	pub(crate) on_delete: Option<OnDelete<V>>,
}

impl<V: CacheValue> CacheBuilder<V> {
	/// Create a builder with the default configuration: 16 buckets, a size
	/// bound of 5000, batches of 500 evictions, promotion every 3 gets, and
	/// queue capacities of 1024.
	pub fn new() -> Self {
		Self {
			max_size: 5000,
			buckets: 16,
			items_to_prune: 500,
			gets_per_promote: 3,
			promote_buffer: 1024,
			delete_buffer: 1024,
			tracking: false,
			on_delete: None,
		}
	}

	/// Total weight the cache may hold before eviction kicks in.
	pub fn max_size(mut self, max_size: u64) -> Self {
		self.max_size = max_size;
		self
	}

	/// Number of shards the primary-key space is split into.
	///
	/// More buckets reduce lock contention but increase memory overhead.
	/// Rounded up to the next power of two.
	pub fn buckets(mut self, count: usize) -> Self {
		self.buckets = count;
		self
	}

	/// Minimum number of items removed per eviction pass.
	pub fn items_to_prune(mut self, count: usize) -> Self {
		self.items_to_prune = count;
		self
	}

	/// Number of gets an item must accumulate before it is moved to the front
	/// of the recency list again. Throttles list churn on hot items.
	pub fn gets_per_promote(mut self, count: i32) -> Self {
		self.gets_per_promote = count.max(1);
		self
	}

	/// Capacity of the promotions queue. When full, get-side recency updates
	/// are dropped rather than blocking the reader.
	pub fn promote_buffer(mut self, capacity: usize) -> Self {
		self.promote_buffer = capacity;
		self
	}

	/// Capacity of the deletions queue. Producers block when it is full, so
	/// size it generously.
	pub fn delete_buffer(mut self, capacity: usize) -> Self {
		self.delete_buffer = capacity;
		self
	}

	/// Enable refcount-aware eviction: items held through
	/// [`tracking_get`](LayeredCache::tracking_get) /
	/// [`tracking_set`](LayeredCache::tracking_set) handles are skipped by
	/// the eviction pass until released.
	pub fn track(mut self) -> Self {
		self.tracking = true;
		self
	}

	/// Callback fired for each item removed by deletion or eviction. Runs on
	/// the maintainer thread; keep it short.
	pub fn on_delete(mut self, f: impl Fn(&Item<V>) + Send + Sync + 'static) -> Self {
		self.on_delete = Some(std::sync::Arc::new(f));
		self
	}

	/// Build the cache and start its maintainer thread.
	pub fn build(self) -> LayeredCache<V> {
		LayeredCache::from_builder(self)
	}
}

impl<V: CacheValue> Default for CacheBuilder<V> {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn test_builder_defaults() {
		let builder = CacheBuilder::<String>::new();
		assert_eq!(builder.max_size, 5000);
		assert_eq!(builder.buckets, 16);
		assert_eq!(builder.items_to_prune, 500);
		assert_eq!(builder.gets_per_promote, 3);
		assert!(!builder.tracking);
	}

	#[test]
	fn test_builder_full_config() {
		let cache: LayeredCache<String> = CacheBuilder::new()
			.max_size(100)
			.buckets(8)
			.items_to_prune(2)
			.gets_per_promote(1)
			.promote_buffer(64)
			.delete_buffer(64)
			.track()
			.build();

		cache.set("p", "s", "v".to_string(), Duration::from_secs(1));
		cache.sync_updates();
		assert_eq!(cache.get_size(), 1);
	}

	#[test]
	fn test_non_power_of_two_buckets_are_rounded() {
		// 12 buckets rounds up to 16; routing still works.
		let cache: LayeredCache<String> = CacheBuilder::new().buckets(12).build();

		for i in 0..50 {
			cache.set(&format!("p{i}"), "s", "v".to_string(), Duration::from_secs(1));
		}
		for i in 0..50 {
			assert!(cache.get(&format!("p{i}"), "s").is_some());
		}
	}

	#[test]
	fn test_gets_per_promote_floor() {
		let builder = CacheBuilder::<String>::new().gets_per_promote(0);
		assert_eq!(builder.gets_per_promote, 1);
	}
}
