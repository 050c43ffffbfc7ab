/// Trait for values stored in the cache.
///
/// The cache bounds its total size by the sum of item weights, so every
/// cached value reports how much of that budget it consumes. The default
/// weight of 1 turns the size bound into a plain item-count bound.
///
/// # Example
///
/// ```
/// use layered_cache::CacheValue;
///
/// struct Page {
/// 	body: Vec<u8>,
/// }
///
/// impl CacheValue for Page {
/// 	fn weight(&self) -> u64 {
/// 		self.body.len() as u64
/// 	}
/// }
/// ```
pub trait CacheValue: Send + Sync + 'static {
	/// Weight contributed to the cache's aggregated size.
	///
	/// Read once when the value is stored; changing the result afterwards has
	/// no effect on accounting.
	fn weight(&self) -> u64 {
		1
	}
}

// Unit-weight impls for common payload types, so simple values work without
// a wrapper.
impl CacheValue for String {}
impl CacheValue for &'static str {}
impl CacheValue for Vec<u8> {}
impl CacheValue for () {}
impl CacheValue for bool {}
impl CacheValue for i32 {}
impl CacheValue for i64 {}
impl CacheValue for u32 {}
impl CacheValue for u64 {}
impl CacheValue for usize {}

impl<T: CacheValue> CacheValue for std::sync::Arc<T> {
	fn weight(&self) -> u64 {
		(**self).weight()
	}
}

impl<T: CacheValue> CacheValue for Box<T> {
	fn weight(&self) -> u64 {
		(**self).weight()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct Weighted(u64);

	impl CacheValue for Weighted {
		fn weight(&self) -> u64 {
			self.0
		}
	}

	#[test]
	fn test_default_weight_is_one() {
		assert_eq!("hello".to_string().weight(), 1);
		assert_eq!(vec![1u8, 2, 3].weight(), 1);
	}

	#[test]
	fn test_custom_weight() {
		assert_eq!(Weighted(42).weight(), 42);
	}

	#[test]
	fn test_wrapper_weight_delegates() {
		assert_eq!(std::sync::Arc::new(Weighted(7)).weight(), 7);
		assert_eq!(Box::new(Weighted(9)).weight(), 9);
	}
}
