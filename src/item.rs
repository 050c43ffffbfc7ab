use std::fmt;
use std::ops::Deref;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicPtr, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::list::Node;
use crate::traits::CacheValue;

/// Promotion counter value marking an item as logically gone. An item carrying
/// this value never enters (or re-enters) the recency list.
pub(crate) const PROMOTIONS_REMOVED: i32 = -2;

/// Sentinel node pointer for an item whose list node has been unlinked.
/// Distinct from null (never admitted) and never dereferenced.
pub(crate) fn removed_node<V>() -> *mut Node<V> {
	usize::MAX as *mut Node<V>
}

/// A single cache entry.
///
/// Items are handed out as `Arc<Item<V>>`, so a caller may keep one after it
/// has been deleted or evicted. The keys, value, weight and expiry are fixed
/// at creation; only the recency bookkeeping fields change afterwards, and
/// those belong to the cache's maintainer.
///
/// An item may be returned by [`LayeredCache::get`](crate::LayeredCache::get)
/// after its TTL has elapsed; check [`expired`](Item::expired) when staleness
/// matters.
pub struct Item<V> {
	primary: String,
	secondary: String,
	/// Routing hash of the primary key, computed once at insert.
	pub(crate) hash: u64,
	value: V,
	size: u64,
	expires: Instant,
	/// Recency-list node: null until first admission, `removed_node()` after
	/// unlinking. Written and dereferenced only by the maintainer.
	pub(crate) node: AtomicPtr<Node<V>>,
	/// Gets observed since the last move-to-front, or `PROMOTIONS_REMOVED`.
	pub(crate) promotions: AtomicI32,
	/// Outstanding tracked handles pinning this item against eviction.
	ref_count: AtomicU32,
}

impl<V: CacheValue> Item<V> {
	pub(crate) fn new(
		primary: &str,
		secondary: &str,
		hash: u64,
		value: V,
		ttl: Duration,
		track: bool,
	) -> Self {
		let size = value.weight();
		Self {
			primary: primary.to_owned(),
			secondary: secondary.to_owned(),
			hash,
			size,
			expires: Instant::now() + ttl,
			value,
			node: AtomicPtr::new(ptr::null_mut()),
			promotions: AtomicI32::new(0),
			ref_count: AtomicU32::new(if track { 1 } else { 0 }),
		}
	}
}

impl<V> Item<V> {
	/// Primary key this item is stored under.
	pub fn primary(&self) -> &str {
		&self.primary
	}

	/// Secondary key this item is stored under.
	pub fn secondary(&self) -> &str {
		&self.secondary
	}

	/// The cached value.
	pub fn value(&self) -> &V {
		&self.value
	}

	/// Weight this item contributes to the cache's size.
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Instant after which the item counts as expired.
	pub fn expires_at(&self) -> Instant {
		self.expires
	}

	/// Whether the item's TTL has elapsed.
	pub fn expired(&self) -> bool {
		Instant::now() >= self.expires
	}

	/// Remaining time to live, zero once expired.
	pub fn ttl(&self) -> Duration {
		self.expires.saturating_duration_since(Instant::now())
	}

	/// Pin the item against eviction. Balanced by `release`.
	pub(crate) fn track(&self) {
		self.ref_count.fetch_add(1, Ordering::AcqRel);
	}

	pub(crate) fn release(&self) {
		self.ref_count.fetch_sub(1, Ordering::AcqRel);
	}

	pub(crate) fn pinned(&self) -> bool {
		self.ref_count.load(Ordering::Acquire) > 0
	}

	/// Count one observed get and report whether the threshold was reached.
	/// Called only by the maintainer.
	pub(crate) fn should_promote(&self, gets_per_promote: i32) -> bool {
		self.promotions.fetch_add(1, Ordering::Relaxed) + 1 >= gets_per_promote
	}

	/// Tombstone the item so queued events referring to it are ignored.
	/// Called only by the maintainer, after unlinking its node.
	pub(crate) fn mark_removed(&self) {
		self.node.store(removed_node(), Ordering::Relaxed);
		self.promotions.store(PROMOTIONS_REMOVED, Ordering::Relaxed);
	}
}

impl<V: fmt::Debug> fmt::Debug for Item<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Item")
			.field("primary", &self.primary)
			.field("secondary", &self.secondary)
			.field("value", &self.value)
			.field("size", &self.size)
			.finish_non_exhaustive()
	}
}

/// An item handle that pins the entry against eviction while held.
///
/// Returned by [`tracking_get`](crate::LayeredCache::tracking_get) and
/// [`tracking_set`](crate::LayeredCache::tracking_set) on a cache built with
/// [`track`](crate::CacheBuilder::track). The pin is released when the handle
/// is dropped.
pub struct TrackedItem<V> {
	item: Arc<Item<V>>,
}

impl<V> TrackedItem<V> {
	pub(crate) fn new(item: Arc<Item<V>>) -> Self {
		Self {
			item,
		}
	}

	/// The underlying shared item.
	pub fn item(&self) -> &Arc<Item<V>> {
		&self.item
	}
}

impl<V> Deref for TrackedItem<V> {
	type Target = Item<V>;

	fn deref(&self) -> &Item<V> {
		&self.item
	}
}

impl<V> Drop for TrackedItem<V> {
	fn drop(&mut self) {
		self.item.release();
	}
}

impl<V: fmt::Debug> fmt::Debug for TrackedItem<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.item.fmt(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_item_accessors() {
		let item = Item::new("user/1", ".json", 7, "body".to_string(), Duration::from_secs(60), false);

		assert_eq!(item.primary(), "user/1");
		assert_eq!(item.secondary(), ".json");
		assert_eq!(item.value(), "body");
		assert_eq!(item.size(), 1);
		assert!(!item.expired());
		assert!(item.ttl() <= Duration::from_secs(60));
	}

	#[test]
	fn test_item_expiry() {
		let item = Item::new("p", "s", 0, "v".to_string(), Duration::ZERO, false);

		assert!(item.expired());
		assert_eq!(item.ttl(), Duration::ZERO);
	}

	#[test]
	fn test_should_promote_threshold() {
		let item = Item::new("p", "s", 0, "v".to_string(), Duration::from_secs(1), false);

		assert!(!item.should_promote(3));
		assert!(!item.should_promote(3));
		assert!(item.should_promote(3));
	}

	#[test]
	fn test_tracking_pins_and_releases() {
		let item = Arc::new(Item::new("p", "s", 0, "v".to_string(), Duration::from_secs(1), true));
		assert!(item.pinned());

		let tracked = TrackedItem::new(item.clone());
		assert_eq!(tracked.primary(), "p");
		drop(tracked);
		assert!(!item.pinned());
	}

	#[test]
	fn test_mark_removed_tombstones() {
		let item = Item::new("p", "s", 0, "v".to_string(), Duration::from_secs(1), false);

		item.mark_removed();
		assert_eq!(item.promotions.load(Ordering::Relaxed), PROMOTIONS_REMOVED);
		assert_eq!(item.node.load(Ordering::Relaxed), removed_node());
	}
}
