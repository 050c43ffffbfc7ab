use std::cmp;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam_channel::{Receiver, Sender, select};

use crate::item::{Item, PROMOTIONS_REMOVED, removed_node};
use crate::list::RecencyList;
use crate::metrics::Counters;
use crate::shard::Shards;
use crate::traits::CacheValue;

/// Callback invoked when an item leaves the cache, whether deleted or evicted.
pub(crate) type OnDelete<V> = Arc<dyn Fn(&Item<V>) + Send + Sync>;

/// Messages served by the maintainer on the control queue. Each request that
/// needs an acknowledgement carries its own reply channel.
pub(crate) enum Control {
	GetSize {
		res: Sender<u64>,
	},
	GetDropped {
		res: Sender<usize>,
	},
	SetMaxSize {
		max: u64,
		done: Sender<()>,
	},
	Gc {
		done: Sender<()>,
	},
	Clear {
		done: Sender<()>,
	},
	SyncUpdates {
		done: Sender<()>,
	},
	Stop,
}

/// The single background actor behind a cache.
///
/// Sole owner of the recency list and the aggregated size: shards never touch
/// either, they only enqueue events. Serializing all list and size mutation
/// through one consumer removes any need for a lock on the hottest shared
/// state.
pub(crate) struct Worker<V> {
	shards: Arc<Shards<V>>,
	promotables: Receiver<Arc<Item<V>>>,
	deletables: Receiver<Arc<Item<V>>>,
	control: Receiver<Control>,
	list: RecencyList<V>,
	size: u64,
	max_size: u64,
	/// Items evicted since the last `GetDropped`.
	dropped: usize,
	items_to_prune: usize,
	gets_per_promote: i32,
	tracking: bool,
	on_delete: Option<OnDelete<V>>,
	counters: Arc<Counters>,
}

impl<V: CacheValue> Worker<V> {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		shards: Arc<Shards<V>>,
		promotables: Receiver<Arc<Item<V>>>,
		deletables: Receiver<Arc<Item<V>>>,
		control: Receiver<Control>,
		max_size: u64,
		items_to_prune: usize,
		gets_per_promote: i32,
		tracking: bool,
		on_delete: Option<OnDelete<V>>,
		counters: Arc<Counters>,
	) -> Self {
		Self {
			shards,
			promotables,
			deletables,
			control,
			list: RecencyList::new(),
			size: 0,
			max_size,
			dropped: 0,
			items_to_prune,
			gets_per_promote,
			tracking,
			on_delete,
			counters,
		}
	}

	/// Event loop. Returns once a `Stop` arrives or every sender is gone.
	pub(crate) fn run(mut self) {
		let promotables = self.promotables.clone();
		let deletables = self.deletables.clone();
		let control = self.control.clone();

		loop {
			select! {
				recv(promotables) -> msg => match msg {
					Ok(item) => self.on_promote(item),
					Err(_) => return,
				},
				recv(deletables) -> msg => match msg {
					Ok(item) => self.on_delete_event(item),
					Err(_) => return,
				},
				recv(control) -> msg => match msg {
					Ok(ctl) => {
						if self.on_control(ctl) {
							return;
						}
					}
					Err(_) => return,
				},
			}
		}
	}

	fn on_promote(&mut self, item: Arc<Item<V>>) {
		if self.admit(item) && self.size > self.max_size {
			self.dropped += self.gc();
		}
	}

	/// Apply one promotion event. Returns true iff the item was newly
	/// admitted to the list.
	fn admit(&mut self, item: Arc<Item<V>>) -> bool {
		// Deleted before it was ever admitted, or already unlinked.
		if item.promotions.load(Ordering::Relaxed) == PROMOTIONS_REMOVED {
			return false;
		}

		let node = item.node.load(Ordering::Relaxed);
		if let Some(node) = NonNull::new(node) {
			// Not a new item: count the get, move to the front only once the
			// threshold is met.
			debug_assert!(node.as_ptr() != removed_node());
			if item.should_promote(self.gets_per_promote) {
				self.list.move_to_front(node);
				item.promotions.store(0, Ordering::Relaxed);
			}
			return false;
		}

		self.size += item.size();
		let node = self.list.push_front(item.clone());
		item.node.store(node.as_ptr(), Ordering::Relaxed);
		true
	}

	/// Apply one deletion event: drop the item's weight and list node. The
	/// item has already been removed from its bucket by the producer.
	fn on_delete_event(&mut self, item: Arc<Item<V>>) {
		let node = item.node.load(Ordering::Relaxed);
		if node.is_null() {
			// Not yet admitted: tombstone so a racing promotion skips it.
			item.promotions.store(PROMOTIONS_REMOVED, Ordering::Relaxed);
			return;
		}
		if node == removed_node() {
			// Already unlinked by an earlier eviction or deletion.
			return;
		}

		self.size -= item.size();
		if let Some(on_delete) = &self.on_delete {
			on_delete(&item);
		}
		// Null-checked above; removed_node() is excluded, so this is the live
		// node installed by admit.
		self.list.unlink(unsafe { NonNull::new_unchecked(node) });
		item.mark_removed();
	}

	/// Serve one control request. Returns true when the worker should exit.
	fn on_control(&mut self, ctl: Control) -> bool {
		match ctl {
			Control::GetSize { res } => {
				let _ = res.send(self.size);
			}
			Control::GetDropped { res } => {
				let _ = res.send(self.dropped);
				self.dropped = 0;
			}
			Control::SetMaxSize { max, done } => {
				self.max_size = max;
				if self.size > self.max_size {
					self.dropped += self.gc();
				}
				let _ = done.send(());
			}
			Control::Gc { done } => {
				self.dropped += self.gc();
				let _ = done.send(());
			}
			Control::Clear { done } => {
				self.clear();
				let _ = done.send(());
			}
			Control::SyncUpdates { done } => {
				self.drain();
				let _ = done.send(());
			}
			Control::Stop => {
				self.drain();
				return true;
			}
		}
		false
	}

	/// Drain everything currently queued, promotions first. One pass per
	/// queue suffices: no thread can enqueue on behalf of another, so a
	/// caller's own events are all present by the time its request is served.
	fn drain(&mut self) {
		while let Ok(item) = self.promotables.try_recv() {
			self.on_promote(item);
		}
		while let Ok(item) = self.deletables.try_recv() {
			self.on_delete_event(item);
		}
	}

	/// One eviction pass over the tail of the list.
	///
	/// Evicts up to `max(items_to_prune, size - max_size)` items, skipping
	/// pinned ones without consuming the budget, and stops at the head at the
	/// latest. Returns the number evicted.
	fn gc(&mut self) -> usize {
		let target = cmp::max(self.items_to_prune as u64, self.size.saturating_sub(self.max_size));
		let mut evicted = 0u64;
		let mut cursor = self.list.back();

		while evicted < target {
			let Some(node) = cursor else {
				break;
			};
			cursor = self.list.prev(node);
			let item = self.list.item(node);

			if self.tracking && item.pinned() {
				continue;
			}

			self.shards.shard_for(item.hash).delete(item.primary(), item.secondary());
			self.size -= item.size();
			self.list.unlink(node);
			item.mark_removed();
			if let Some(on_delete) = &self.on_delete {
				on_delete(&item);
			}
			evicted += 1;
		}

		self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);
		evicted as usize
	}

	/// Drop every shard's contents and reset the list and size.
	fn clear(&mut self) {
		// Tombstone every resident item first: events still queued for them
		// must neither re-admit an item nor touch a freed list node.
		self.shards.clear(&mut |item| {
			item.promotions.store(PROMOTIONS_REMOVED, Ordering::Relaxed);
		});
		self.list.drain(|item| item.mark_removed());
		self.size = 0;
	}
}
