use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};
use parking_lot::Mutex;

use crate::builder::CacheBuilder;
use crate::item::{Item, TrackedItem};
use crate::metrics::{CacheMetrics, Counters};
use crate::secondary::SecondaryCache;
use crate::shard::Shards;
use crate::traits::CacheValue;
use crate::worker::{Control, Worker};

/// A high-concurrency cache addressing entries by a (primary, secondary) key
/// pair, bounded by total item weight with approximate LRU eviction.
///
/// Single-entry operations take both keys; the bulk deletions act on every
/// entry sharing a primary key. A layered cache works well as an HTTP cache,
/// where a purge removes all variants of one resource at once:
///
/// ```
/// use std::time::Duration;
///
/// use layered_cache::LayeredCache;
///
/// let cache: LayeredCache<String> = LayeredCache::new(1024);
/// cache.set("user/44", ".json", "{\"id\":44}".to_string(), Duration::from_secs(60));
/// cache.set("user/44", ".xml", "<user/>".to_string(), Duration::from_secs(60));
///
/// assert!(cache.get("user/44", ".json").is_some());
/// assert!(cache.delete_all("user/44"));
/// assert!(cache.get("user/44", ".xml").is_none());
/// ```
///
/// Lookups and writes touch only the owning shard; recency bookkeeping and
/// eviction run on a single background maintainer fed through queues, so
/// readers never contend on a global lock. The side effect is that size
/// accounting and LRU order are eventually consistent — tests and shutdown
/// paths can force visibility with [`sync_updates`](LayeredCache::sync_updates).
///
/// The cache can be shared across threads via `Arc<LayeredCache<V>>`. All
/// methods are synchronous but safe to call from async contexts; none of them
/// hold a lock across a caller-visible suspension point.
pub struct LayeredCache<V: CacheValue> {
	shards: Arc<Shards<V>>,
	promotables: Sender<Arc<Item<V>>>,
	deletables: Sender<Arc<Item<V>>>,
	control: Sender<Control>,
	counters: Arc<Counters>,
	worker: Mutex<Option<JoinHandle<()>>>,
}

impl<V: CacheValue> LayeredCache<V> {
	/// Create a cache bounded by `max_size` total weight, with default
	/// configuration for everything else. See [`CacheBuilder`] for the knobs.
	pub fn new(max_size: u64) -> Self {
		CacheBuilder::new().max_size(max_size).build()
	}

	pub(crate) fn from_builder(builder: CacheBuilder<V>) -> Self {
		// Power-of-two shard count so routing reduces to a mask.
		let shards = Arc::new(Shards::new(builder.buckets.next_power_of_two()));
		let counters = Arc::new(Counters::default());

		let (promotables, promote_rx) = bounded(builder.promote_buffer.max(1));
		let (deletables, delete_rx) = bounded(builder.delete_buffer.max(1));
		// Rendezvous channel: control requests are handed directly to the
		// maintainer, which orders them against queued events.
		let (control, control_rx) = bounded(0);

		let worker = Worker::new(
			shards.clone(),
			promote_rx,
			delete_rx,
			control_rx,
			builder.max_size,
			builder.items_to_prune,
			builder.gets_per_promote,
			builder.tracking,
			builder.on_delete,
			counters.clone(),
		);
		let handle = thread::Builder::new()
			.name("layered-cache-worker".to_owned())
			.spawn(move || worker.run())
			.expect("failed to spawn cache maintainer thread");

		Self {
			shards,
			promotables,
			deletables,
			control,
			counters,
			worker: Mutex::new(Some(handle)),
		}
	}

	/// Get an item, or `None` if it isn't cached.
	///
	/// This can return an expired item: expiry is reported, not enforced.
	/// Check [`Item::expired`] (or [`Item::ttl`]) when staleness matters. A
	/// hit on a live item schedules a recency update; if the promotions queue
	/// is full the update is dropped rather than stalling the read.
	pub fn get(&self, primary: &str, secondary: &str) -> Option<Arc<Item<V>>> {
		let Some(item) = self.shards.shard(primary).get(primary, secondary) else {
			self.counters.misses.fetch_add(1, Ordering::Relaxed);
			return None;
		};
		self.counters.hits.fetch_add(1, Ordering::Relaxed);
		if !item.expired() {
			self.promote(&item);
		}
		Some(item)
	}

	/// Get an item without scheduling a recency update.
	pub fn get_without_promote(&self, primary: &str, secondary: &str) -> Option<Arc<Item<V>>> {
		let item = self.shards.shard(primary).get(primary, secondary);
		match &item {
			Some(_) => self.counters.hits.fetch_add(1, Ordering::Relaxed),
			None => self.counters.misses.fetch_add(1, Ordering::Relaxed),
		};
		item
	}

	/// Insert or replace the value under `(primary, secondary)` for `ttl`.
	///
	/// A replaced item is scheduled for deletion; the new item's admission to
	/// the recency list is guaranteed (the enqueue blocks if the promotions
	/// queue is full) but asynchronous — use
	/// [`sync_updates`](LayeredCache::sync_updates) to wait for it.
	pub fn set(&self, primary: &str, secondary: &str, value: V, ttl: Duration) -> Arc<Item<V>> {
		self.set_inner(primary, secondary, value, ttl, false)
	}

	/// Replace the value if the key pair is present, keeping the remaining
	/// TTL. Returns false, without storing, if it is absent.
	pub fn replace(&self, primary: &str, secondary: &str, value: V) -> bool {
		let Some(existing) = self.shards.shard(primary).get(primary, secondary) else {
			return false;
		};
		self.set(primary, secondary, value, existing.ttl());
		true
	}

	/// Get an item, calling `fetch` to produce and cache the value on a miss.
	///
	/// A hit is returned as-is, even if expired. A `fetch` error is
	/// propagated and nothing is cached.
	pub fn fetch<F, E>(
		&self,
		primary: &str,
		secondary: &str,
		ttl: Duration,
		fetch: F,
	) -> Result<Arc<Item<V>>, E>
	where
		F: FnOnce() -> Result<V, E>,
	{
		if let Some(item) = self.get(primary, secondary) {
			return Ok(item);
		}
		Ok(self.set_inner(primary, secondary, fetch()?, ttl, false))
	}

	/// Remove one entry. Returns whether it was present.
	pub fn delete(&self, primary: &str, secondary: &str) -> bool {
		match self.shards.shard(primary).delete(primary, secondary) {
			Some(item) => {
				self.finish_delete(item);
				true
			}
			None => false,
		}
	}

	/// Remove every entry under `primary`. Returns whether the primary key
	/// was present.
	pub fn delete_all(&self, primary: &str) -> bool {
		match self.shards.shard(primary).delete_all(primary, &self.deletables) {
			Some(removed) => {
				self.counters.deletes.fetch_add(removed as u64, Ordering::Relaxed);
				true
			}
			None => false,
		}
	}

	/// Remove every entry under `primary` whose secondary key starts with
	/// `prefix`. Returns the number removed.
	pub fn delete_prefix(&self, primary: &str, prefix: &str) -> usize {
		let removed = self.shards.shard(primary).delete_prefix(primary, prefix, &self.deletables);
		self.counters.deletes.fetch_add(removed as u64, Ordering::Relaxed);
		removed
	}

	/// Remove every entry under `primary` for which `matches` holds. Returns
	/// the number removed.
	pub fn delete_func(
		&self,
		primary: &str,
		matches: impl FnMut(&str, &Arc<Item<V>>) -> bool,
	) -> usize {
		let removed = self.shards.shard(primary).delete_func(primary, matches, &self.deletables);
		self.counters.deletes.fetch_add(removed as u64, Ordering::Relaxed);
		removed
	}

	/// Visit the entries under `primary` until `matches` returns false. The
	/// iteration sees a consistent snapshot of the bucket, held under its
	/// lock for the duration.
	pub fn for_each_func(&self, primary: &str, matches: impl FnMut(&str, &Arc<Item<V>>) -> bool) {
		self.shards.shard(primary).for_each_func(primary, matches);
	}

	/// A handle bound to the secondary bucket for `primary`, creating the
	/// bucket if needed. Useful to batch several operations under one primary
	/// without re-routing each time.
	pub fn get_or_create_secondary_cache(&self, primary: &str) -> SecondaryCache<'_, V> {
		let hash = self.shards.hash(primary);
		let bucket = self.shards.shard_for(hash).get_or_create(primary);
		SecondaryCache::new(primary.to_owned(), hash, bucket, self)
	}

	/// Like [`get`](LayeredCache::get), returning a handle that pins the item
	/// against eviction until dropped. Only meaningful on a cache built with
	/// [`track`](CacheBuilder::track).
	pub fn tracking_get(&self, primary: &str, secondary: &str) -> Option<TrackedItem<V>> {
		let item = self.get(primary, secondary)?;
		item.track();
		Some(TrackedItem::new(item))
	}

	/// Like [`set`](LayeredCache::set), returning a handle that pins the new
	/// item against eviction until dropped.
	pub fn tracking_set(
		&self,
		primary: &str,
		secondary: &str,
		value: V,
		ttl: Duration,
	) -> TrackedItem<V> {
		// The item is created already pinned, so eviction cannot reap it
		// before the handle exists.
		TrackedItem::new(self.set_inner(primary, secondary, value, ttl, true))
	}

	/// Total number of cached items, summed across shards without
	/// synchronization. Approximate under concurrent mutation.
	pub fn item_count(&self) -> usize {
		self.shards.item_count()
	}

	/// The maintainer's authoritative aggregated size. Reflects every event
	/// it has processed; pair with [`sync_updates`](LayeredCache::sync_updates)
	/// for a deterministic reading.
	pub fn get_size(&self) -> u64 {
		self.query(|res| Control::GetSize { res }, 0)
	}

	/// Number of items evicted since the last call, resetting the counter.
	pub fn get_dropped(&self) -> usize {
		self.query(|res| Control::GetDropped { res }, 0)
	}

	/// Update the size bound. Shrinking below the current size triggers an
	/// eviction pass before this returns.
	pub fn set_max_size(&self, max_size: u64) {
		self.signal(|done| Control::SetMaxSize {
			max: max_size,
			done,
		});
	}

	/// Force one eviction pass.
	pub fn gc(&self) {
		self.signal(|done| Control::Gc { done });
	}

	/// Drop every entry and reset the recency list and size.
	pub fn clear(&self) {
		self.signal(|done| Control::Clear { done });
	}

	/// Wait until every promotion and deletion queued before this call has
	/// been applied. On return, this thread's earlier `set`s are admitted and
	/// counted and its earlier deletions are reflected in
	/// [`get_size`](LayeredCache::get_size).
	pub fn sync_updates(&self) {
		self.signal(|done| Control::SyncUpdates { done });
	}

	/// Shut the maintainer down after it drains the queues, and wait for it
	/// to exit. Further operations on the cache are best-effort no-ops;
	/// `stop` itself is idempotent.
	pub fn stop(&self) {
		let handle = self.worker.lock().take();
		if let Some(handle) = handle {
			let _ = self.control.send(Control::Stop);
			let _ = handle.join();
		}
	}

	/// Snapshot of the cache's activity counters.
	pub fn metrics(&self) -> CacheMetrics {
		self.counters.snapshot()
	}

	pub(crate) fn set_inner(
		&self,
		primary: &str,
		secondary: &str,
		value: V,
		ttl: Duration,
		track: bool,
	) -> Arc<Item<V>> {
		let hash = self.shards.hash(primary);
		let (item, existing) =
			self.shards.shard_for(hash).set(primary, secondary, hash, value, ttl, track);
		self.finish_set(item, existing)
	}

	/// Enqueue the side effects of a completed bucket insert: the replaced
	/// item's deletion and the new item's admission.
	pub(crate) fn finish_set(
		&self,
		item: Arc<Item<V>>,
		existing: Option<Arc<Item<V>>>,
	) -> Arc<Item<V>> {
		if let Some(existing) = existing {
			let _ = self.deletables.send(existing);
		}
		// Admission must not be lost: block rather than drop when full.
		let _ = self.promotables.send(item.clone());
		self.counters.sets.fetch_add(1, Ordering::Relaxed);
		item
	}

	pub(crate) fn finish_delete(&self, item: Arc<Item<V>>) {
		let _ = self.deletables.send(item);
		self.counters.deletes.fetch_add(1, Ordering::Relaxed);
	}

	/// Best-effort recency update: never blocks the reader, drops the event
	/// when the queue is full.
	pub(crate) fn promote(&self, item: &Arc<Item<V>>) {
		if self.promotables.try_send(item.clone()).is_err() {
			self.counters.dropped_promotions.fetch_add(1, Ordering::Relaxed);
		}
	}

	fn query<T>(&self, request: impl FnOnce(Sender<T>) -> Control, fallback: T) -> T {
		let (res, reply) = bounded(1);
		if self.control.send(request(res)).is_err() {
			return fallback;
		}
		reply.recv().unwrap_or(fallback)
	}

	fn signal(&self, request: impl FnOnce(Sender<()>) -> Control) {
		let (done, ack) = bounded(1);
		if self.control.send(request(done)).is_ok() {
			let _ = ack.recv();
		}
	}
}

impl<V: CacheValue> Drop for LayeredCache<V> {
	fn drop(&mut self) {
		self.stop();
	}
}

impl<V: CacheValue> std::fmt::Debug for LayeredCache<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LayeredCache")
			.field("item_count", &self.shards.item_count())
			.finish_non_exhaustive()
	}
}
