//! Tests for async usage patterns.

use std::sync::Arc;
use std::time::Duration;

use layered_cache::{CacheBuilder, CacheValue, LayeredCache};

const TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq)]
struct AsyncValue {
	data: String,
}

impl CacheValue for AsyncValue {}

#[tokio::test]
async fn test_items_can_be_held_across_awaits() {
	let cache: Arc<LayeredCache<AsyncValue>> = Arc::new(LayeredCache::new(1024));

	cache.set(
		"user/1",
		".json",
		AsyncValue {
			data: "async test".to_string(),
		},
		TTL,
	);

	let item = cache.get("user/1", ".json").expect("item should exist");
	// Items are plain Arcs, safe to hold across await points.
	tokio::task::yield_now().await;
	assert_eq!(item.value().data, "async test");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_across_tasks() {
	let cache: Arc<LayeredCache<AsyncValue>> =
		Arc::new(CacheBuilder::new().max_size(100_000).build());
	let mut handles = vec![];

	for t in 0..8 {
		let cache = cache.clone();
		handles.push(tokio::spawn(async move {
			for i in 0..50 {
				let primary = format!("task/{t}");
				let secondary = format!("s{i}");
				cache.set(
					&primary,
					&secondary,
					AsyncValue {
						data: format!("value-{i}"),
					},
					TTL,
				);
				tokio::task::yield_now().await;

				let item = cache.get(&primary, &secondary).expect("own write should be visible");
				assert_eq!(item.value().data, format!("value-{i}"));
			}
		}));
	}
	for handle in handles {
		handle.await.expect("task should not panic");
	}

	cache.sync_updates();
	assert_eq!(cache.get_size(), 8 * 50);
}

#[tokio::test]
async fn test_fetch_with_async_produced_value() {
	let cache: Arc<LayeredCache<AsyncValue>> = Arc::new(LayeredCache::new(1024));

	// Produce the value before entering the synchronous fetch; the loader
	// itself stays synchronous.
	let loaded = expensive_load().await;
	let item = cache
		.fetch("user/1", ".json", TTL, || Ok::<_, String>(loaded))
		.expect("fetch should succeed");
	assert_eq!(item.value().data, "loaded");

	let again = cache
		.fetch("user/1", ".json", TTL, || Err::<AsyncValue, _>("miss".to_string()))
		.expect("hit must not invoke the loader");
	assert_eq!(again.value().data, "loaded");
}

async fn expensive_load() -> AsyncValue {
	tokio::task::yield_now().await;
	AsyncValue {
		data: "loaded".to_string(),
	}
}

#[tokio::test]
async fn test_delete_all_from_task() {
	let cache: Arc<LayeredCache<AsyncValue>> = Arc::new(LayeredCache::new(1024));

	for i in 0..10 {
		cache.set(
			"user/1",
			&format!("s{i}"),
			AsyncValue {
				data: "x".to_string(),
			},
			TTL,
		);
	}

	let purger = cache.clone();
	tokio::spawn(async move {
		purger.delete_all("user/1");
	})
	.await
	.expect("task should not panic");

	cache.sync_updates();
	assert_eq!(cache.get_size(), 0);
	assert!(cache.get("user/1", "s0").is_none());
}
