use std::hash::BuildHasher;
use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use crossbeam_channel::Sender;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::bucket::Bucket;
use crate::item::Item;
use crate::traits::CacheValue;

/// One shard of the primary-key space: a map from primary key to its
/// secondary bucket, guarded by the shard lock.
///
/// Single-entry reads take the shard lock shared; the bucket's own lock
/// guards the inner map.
pub(crate) struct LayeredShard<V> {
	buckets: RwLock<HashMap<String, Arc<Bucket<V>>, RandomState>>,
}

impl<V> LayeredShard<V> {
	fn new() -> Self {
		Self {
			buckets: RwLock::new(HashMap::default()),
		}
	}

	pub(crate) fn get(&self, primary: &str, secondary: &str) -> Option<Arc<Item<V>>> {
		self.buckets.read().get(primary)?.get(secondary)
	}

	pub(crate) fn get_secondary_bucket(&self, primary: &str) -> Option<Arc<Bucket<V>>> {
		self.buckets.read().get(primary).cloned()
	}

	/// Return the bucket for `primary`, installing an empty one if absent.
	/// A bucket admitted by a racing writer is never overwritten.
	pub(crate) fn get_or_create(&self, primary: &str) -> Arc<Bucket<V>> {
		if let Some(bucket) = self.buckets.read().get(primary) {
			return bucket.clone();
		}
		let mut buckets = self.buckets.write();
		buckets
			.entry(primary.to_owned())
			.or_insert_with(|| Arc::new(Bucket::new()))
			.clone()
	}

	pub(crate) fn delete(&self, primary: &str, secondary: &str) -> Option<Arc<Item<V>>> {
		self.buckets.read().get(primary)?.delete(secondary)
	}

	/// Remove the whole secondary bucket, pushing every item it held into
	/// `sink`. Returns the number of items removed, or `None` if the bucket
	/// did not exist.
	pub(crate) fn delete_all(&self, primary: &str, sink: &Sender<Arc<Item<V>>>) -> Option<usize> {
		let bucket = self.buckets.write().remove(primary)?;
		let mut removed = 0;
		bucket.clear(&mut |item| {
			removed += 1;
			let _ = sink.send(item.clone());
		});
		Some(removed)
	}

	pub(crate) fn delete_prefix(
		&self,
		primary: &str,
		prefix: &str,
		sink: &Sender<Arc<Item<V>>>,
	) -> usize {
		match self.buckets.read().get(primary) {
			Some(bucket) => bucket.delete_prefix(prefix, sink),
			None => 0,
		}
	}

	pub(crate) fn delete_func(
		&self,
		primary: &str,
		matches: impl FnMut(&str, &Arc<Item<V>>) -> bool,
		sink: &Sender<Arc<Item<V>>>,
	) -> usize {
		match self.buckets.read().get(primary) {
			Some(bucket) => bucket.delete_func(matches, sink),
			None => 0,
		}
	}

	pub(crate) fn for_each_func(&self, primary: &str, matches: impl FnMut(&str, &Arc<Item<V>>) -> bool) {
		if let Some(bucket) = self.buckets.read().get(primary) {
			bucket.for_each_func(matches);
		}
	}

	pub(crate) fn item_count(&self) -> usize {
		self.buckets.read().values().map(|bucket| bucket.len()).sum()
	}

	/// Drop every bucket, handing each resident item to `f` first.
	pub(crate) fn clear(&self, f: &mut impl FnMut(&Arc<Item<V>>)) {
		let mut buckets = self.buckets.write();
		for bucket in buckets.values() {
			bucket.clear(f);
		}
		buckets.clear();
	}
}

impl<V: CacheValue> LayeredShard<V> {
	pub(crate) fn set(
		&self,
		primary: &str,
		secondary: &str,
		hash: u64,
		value: V,
		ttl: Duration,
		track: bool,
	) -> (Arc<Item<V>>, Option<Arc<Item<V>>>) {
		self.get_or_create(primary).set(primary, secondary, hash, value, ttl, track)
	}
}

/// The routing table: a power-of-two array of shards plus the primary-key
/// hasher, shared between the cache façade and the maintainer.
pub(crate) struct Shards<V> {
	shards: Box<[LayeredShard<V>]>,
	mask: u64,
	hasher: RandomState,
}

impl<V> Shards<V> {
	/// `count` must be a power of two; the builder normalizes it.
	pub(crate) fn new(count: usize) -> Self {
		debug_assert!(count.is_power_of_two());
		Self {
			shards: (0..count).map(|_| LayeredShard::new()).collect(),
			mask: count as u64 - 1,
			hasher: RandomState::new(),
		}
	}

	/// Routing hash of a primary key. Stable for the life of the cache.
	pub(crate) fn hash(&self, primary: &str) -> u64 {
		self.hasher.hash_one(primary)
	}

	pub(crate) fn shard(&self, primary: &str) -> &LayeredShard<V> {
		self.shard_for(self.hash(primary))
	}

	pub(crate) fn shard_for(&self, hash: u64) -> &LayeredShard<V> {
		&self.shards[(hash & self.mask) as usize]
	}

	pub(crate) fn item_count(&self) -> usize {
		self.shards.iter().map(|shard| shard.item_count()).sum()
	}

	pub(crate) fn clear(&self, f: &mut impl FnMut(&Arc<Item<V>>)) {
		for shard in self.shards.iter() {
			shard.clear(f);
		}
	}
}
