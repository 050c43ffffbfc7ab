//! # layered-cache
//!
//! A high-concurrency, in-memory cache with:
//! - **Two-level keying**: entries are addressed by a (primary, secondary)
//!   key pair, and bulk invalidation acts on everything sharing a primary key
//!   (exactly, by secondary-key prefix, or by predicate)
//! - **Weight-bounded capacity** with approximate LRU eviction
//! - **Read-optimized concurrency**: sharded maps on the lookup path, with
//!   all recency bookkeeping and eviction handled by a single background
//!   maintainer fed through queues
//! - **TTL reporting**: expired entries are returned and flagged, never
//!   silently served as fresh
//! - **Optional pinning**: tracked handles keep hot items safe from eviction
//!   while a caller holds them
//!
//! ## Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use layered_cache::LayeredCache;
//!
//! // Bound the cache at 1000 weight units (unit-weight values make this an
//! // item count).
//! let cache: LayeredCache<String> = LayeredCache::new(1000);
//!
//! // Cache two representations of the same resource.
//! cache.set("user/44", ".json", "{\"id\":44}".to_string(), Duration::from_secs(60));
//! cache.set("user/44", ".xml", "<user id=\"44\"/>".to_string(), Duration::from_secs(60));
//!
//! let item = cache.get("user/44", ".json").expect("cached");
//! assert!(!item.expired());
//! assert_eq!(item.value(), "{\"id\":44}");
//!
//! // Purge every representation at once.
//! cache.delete_all("user/44");
//! assert!(cache.get("user/44", ".xml").is_none());
//! ```
//!
//! ## Weighted values
//!
//! Implement [`CacheValue`] to report a value's weight; the cache evicts
//! least-recently-used items once the summed weight exceeds the configured
//! bound. The default weight is 1.
//!
//! ```
//! use layered_cache::{CacheBuilder, CacheValue};
//!
//! struct Page {
//! 	body: Vec<u8>,
//! }
//!
//! impl CacheValue for Page {
//! 	fn weight(&self) -> u64 {
//! 		self.body.len() as u64
//! 	}
//! }
//!
//! let cache = CacheBuilder::<Page>::new().max_size(64 * 1024 * 1024).build();
//! # drop(cache);
//! ```
//!
//! ## Consistency model
//!
//! Lookups and writes are linearizable per shard, but recency order and the
//! aggregated size are maintained asynchronously by the background worker.
//! [`LayeredCache::sync_updates`] waits until everything the calling thread
//! has queued is applied, which makes effects deterministic in tests:
//!
//! ```
//! use std::time::Duration;
//!
//! use layered_cache::LayeredCache;
//!
//! let cache: LayeredCache<String> = LayeredCache::new(1000);
//! cache.set("a", "b", "c".to_string(), Duration::from_secs(60));
//! cache.sync_updates();
//! assert_eq!(cache.get_size(), 1);
//! ```

mod bucket;
mod builder;
mod cache;
mod item;
mod list;
mod metrics;
mod secondary;
mod shard;
mod traits;
mod worker;

pub use builder::CacheBuilder;
pub use cache::LayeredCache;
pub use item::{Item, TrackedItem};
pub use metrics::CacheMetrics;
pub use secondary::SecondaryCache;
pub use traits::CacheValue;
