use std::sync::Arc;
use std::time::Duration;

use ahash::RandomState;
use crossbeam_channel::Sender;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::item::Item;
use crate::traits::CacheValue;

/// Map from secondary key to item, guarded by its own lock.
///
/// Buckets are installed in a shard behind an `Arc`, so they keep a stable
/// identity for the life of the primary key and can be handed out as
/// [`SecondaryCache`](crate::SecondaryCache) handles.
pub(crate) struct Bucket<V> {
	lookup: RwLock<HashMap<String, Arc<Item<V>>, RandomState>>,
}

impl<V> Bucket<V> {
	pub(crate) fn new() -> Self {
		Self {
			lookup: RwLock::new(HashMap::default()),
		}
	}

	pub(crate) fn get(&self, secondary: &str) -> Option<Arc<Item<V>>> {
		self.lookup.read().get(secondary).cloned()
	}

	pub(crate) fn len(&self) -> usize {
		self.lookup.read().len()
	}

	/// Remove and return the item stored under `secondary`.
	pub(crate) fn delete(&self, secondary: &str) -> Option<Arc<Item<V>>> {
		self.lookup.write().remove(secondary)
	}

	/// Remove every entry whose secondary key starts with `prefix`, pushing
	/// each removed item into `sink`. Returns the number removed.
	pub(crate) fn delete_prefix(&self, prefix: &str, sink: &Sender<Arc<Item<V>>>) -> usize {
		let mut removed = 0;
		self.lookup.write().retain(|secondary, item| {
			if secondary.starts_with(prefix) {
				removed += 1;
				let _ = sink.send(item.clone());
				false
			} else {
				true
			}
		});
		removed
	}

	/// Remove every entry for which `matches` holds, pushing each removed
	/// item into `sink`. Returns the number removed.
	pub(crate) fn delete_func(
		&self,
		mut matches: impl FnMut(&str, &Arc<Item<V>>) -> bool,
		sink: &Sender<Arc<Item<V>>>,
	) -> usize {
		let mut removed = 0;
		self.lookup.write().retain(|secondary, item| {
			if matches(secondary, item) {
				removed += 1;
				let _ = sink.send(item.clone());
				false
			} else {
				true
			}
		});
		removed
	}

	/// Visit entries under the bucket lock until `matches` returns false.
	pub(crate) fn for_each_func(&self, mut matches: impl FnMut(&str, &Arc<Item<V>>) -> bool) {
		for (secondary, item) in self.lookup.read().iter() {
			if !matches(secondary, item) {
				break;
			}
		}
	}

	/// Drop every entry, handing each to `f` first.
	pub(crate) fn clear(&self, f: &mut impl FnMut(&Arc<Item<V>>)) {
		let mut lookup = self.lookup.write();
		for (_, item) in lookup.drain() {
			f(&item);
		}
	}
}

impl<V: CacheValue> Bucket<V> {
	/// Store a fresh item, returning it along with any replaced prior item.
	/// The caller is responsible for scheduling the prior item's deletion.
	pub(crate) fn set(
		&self,
		primary: &str,
		secondary: &str,
		hash: u64,
		value: V,
		ttl: Duration,
		track: bool,
	) -> (Arc<Item<V>>, Option<Arc<Item<V>>>) {
		let item = Arc::new(Item::new(primary, secondary, hash, value, ttl, track));
		let existing = self.lookup.write().insert(secondary.to_owned(), item.clone());
		(item, existing)
	}
}

#[cfg(test)]
mod tests {
	use crossbeam_channel::unbounded;

	use super::*;

	const TTL: Duration = Duration::from_secs(60);

	#[test]
	fn test_set_and_get() {
		let bucket: Bucket<String> = Bucket::new();

		let (item, existing) = bucket.set("p", ".json", 0, "a".to_string(), TTL, false);
		assert!(existing.is_none());
		assert_eq!(item.value(), "a");

		let found = bucket.get(".json").expect("item should exist");
		assert!(Arc::ptr_eq(&found, &item));
		assert!(bucket.get(".xml").is_none());
	}

	#[test]
	fn test_set_returns_replaced_item() {
		let bucket: Bucket<String> = Bucket::new();

		let (first, _) = bucket.set("p", ".json", 0, "a".to_string(), TTL, false);
		let (second, existing) = bucket.set("p", ".json", 0, "b".to_string(), TTL, false);

		let existing = existing.expect("prior item should be returned");
		assert!(Arc::ptr_eq(&existing, &first));
		assert_eq!(bucket.len(), 1);
		assert!(Arc::ptr_eq(&bucket.get(".json").expect("item should exist"), &second));
	}

	#[test]
	fn test_delete() {
		let bucket: Bucket<String> = Bucket::new();
		bucket.set("p", ".json", 0, "a".to_string(), TTL, false);

		assert!(bucket.delete(".json").is_some());
		assert!(bucket.delete(".json").is_none());
		assert_eq!(bucket.len(), 0);
	}

	#[test]
	fn test_delete_prefix_pushes_to_sink() {
		let bucket: Bucket<String> = Bucket::new();
		bucket.set("p", "user:1", 0, "a".to_string(), TTL, false);
		bucket.set("p", "user:2", 0, "b".to_string(), TTL, false);
		bucket.set("p", "admin:1", 0, "c".to_string(), TTL, false);

		let (sink, drained) = unbounded();
		let removed = bucket.delete_prefix("user:", &sink);

		assert_eq!(removed, 2);
		assert_eq!(drained.len(), 2);
		assert_eq!(bucket.len(), 1);
		assert!(bucket.get("admin:1").is_some());
	}

	#[test]
	fn test_delete_func() {
		let bucket: Bucket<String> = Bucket::new();
		bucket.set("p", "a", 0, "keep".to_string(), TTL, false);
		bucket.set("p", "b", 0, "drop".to_string(), TTL, false);

		let (sink, drained) = unbounded();
		let removed = bucket.delete_func(|_, item| item.value() == "drop", &sink);

		assert_eq!(removed, 1);
		assert_eq!(drained.len(), 1);
		assert!(bucket.get("a").is_some());
		assert!(bucket.get("b").is_none());
	}

	#[test]
	fn test_for_each_func_stops_early() {
		let bucket: Bucket<String> = Bucket::new();
		bucket.set("p", "a", 0, "x".to_string(), TTL, false);
		bucket.set("p", "b", 0, "x".to_string(), TTL, false);
		bucket.set("p", "c", 0, "x".to_string(), TTL, false);

		let mut visited = 0;
		bucket.for_each_func(|_, _| {
			visited += 1;
			false
		});
		assert_eq!(visited, 1);
	}

	#[test]
	fn test_clear() {
		let bucket: Bucket<String> = Bucket::new();
		bucket.set("p", "a", 0, "x".to_string(), TTL, false);
		bucket.set("p", "b", 0, "x".to_string(), TTL, false);

		let mut cleared = 0;
		bucket.clear(&mut |_| cleared += 1);

		assert_eq!(cleared, 2);
		assert_eq!(bucket.len(), 0);
	}
}
