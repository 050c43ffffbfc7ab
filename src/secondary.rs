use std::sync::Arc;
use std::time::Duration;

use crate::bucket::Bucket;
use crate::cache::LayeredCache;
use crate::item::{Item, TrackedItem};
use crate::traits::CacheValue;

/// A handle bound to one primary key's secondary bucket.
///
/// Returned by
/// [`get_or_create_secondary_cache`](LayeredCache::get_or_create_secondary_cache).
/// Operations skip primary-key routing and go straight to the bucket, while
/// recency and size side effects still flow through the owning cache's
/// maintainer. The handle stays valid even if the primary key is later
/// deleted; it then addresses a detached bucket.
pub struct SecondaryCache<'a, V: CacheValue> {
	primary: String,
	hash: u64,
	bucket: Arc<Bucket<V>>,
	cache: &'a LayeredCache<V>,
}

impl<'a, V: CacheValue> SecondaryCache<'a, V> {
	pub(crate) fn new(
		primary: String,
		hash: u64,
		bucket: Arc<Bucket<V>>,
		cache: &'a LayeredCache<V>,
	) -> Self {
		Self {
			primary,
			hash,
			bucket,
			cache,
		}
	}

	/// The primary key this handle is bound to.
	pub fn primary(&self) -> &str {
		&self.primary
	}

	/// Get an item from the bucket, without scheduling a recency update.
	pub fn get(&self, secondary: &str) -> Option<Arc<Item<V>>> {
		self.bucket.get(secondary)
	}

	/// Insert or replace the value under `secondary` for `ttl`.
	pub fn set(&self, secondary: &str, value: V, ttl: Duration) -> Arc<Item<V>> {
		let (item, existing) =
			self.bucket.set(&self.primary, secondary, self.hash, value, ttl, false);
		self.cache.finish_set(item, existing)
	}

	/// Replace the value if present, keeping the remaining TTL. Returns false
	/// without storing if absent.
	pub fn replace(&self, secondary: &str, value: V) -> bool {
		let Some(existing) = self.get(secondary) else {
			return false;
		};
		self.set(secondary, value, existing.ttl());
		true
	}

	/// Get an item, calling `fetch` to produce and cache the value on a miss.
	pub fn fetch<F, E>(&self, secondary: &str, ttl: Duration, fetch: F) -> Result<Arc<Item<V>>, E>
	where
		F: FnOnce() -> Result<V, E>,
	{
		if let Some(item) = self.get(secondary) {
			return Ok(item);
		}
		Ok(self.set(secondary, fetch()?, ttl))
	}

	/// Remove one entry. Returns whether it was present.
	pub fn delete(&self, secondary: &str) -> bool {
		match self.bucket.delete(secondary) {
			Some(item) => {
				self.cache.finish_delete(item);
				true
			}
			None => false,
		}
	}

	/// Like [`get`](SecondaryCache::get), returning a handle that pins the
	/// item against eviction until dropped.
	pub fn tracking_get(&self, secondary: &str) -> Option<TrackedItem<V>> {
		let item = self.get(secondary)?;
		item.track();
		Some(TrackedItem::new(item))
	}
}
