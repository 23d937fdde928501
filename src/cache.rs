//! Distributed cache contract and built-in backends.
//!
//! Every cached value is opaque bytes with a TTL; callers (the token exchanger, the access
//! data source, the idempotency ledger) own their own key namespacing and serialization.
//! There is deliberately no iteration or prefix-scan API: every consumer of this crate knows
//! its own keys and nothing should ever need to enumerate the cache.

pub mod memory;
pub mod redis;

pub use memory::InProcessCache;
pub use redis::NetworkedCache;

// self
use crate::_prelude::*;
use crate::error::CacheError;

/// Future returned by [`SharedCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Networked or in-process shared cache backend.
pub trait SharedCache
where
	Self: Send + Sync,
{
	/// Fetches the value stored at `key`, if present and not expired.
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>>;

	/// Stores `value` at `key` with the given time-to-live.
	fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()>;

	/// Removes the value stored at `key`, if any.
	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()>;

	/// Returns `true` when `key` currently holds a non-expired value, without returning it.
	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool>;

	/// Atomically stores `value` at `key` only if no value is currently present, returning
	/// `true` when the write happened. Used by the idempotency ledger to avoid a
	/// read-then-write race.
	fn set_if_absent<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, bool>;

	/// Returns `true` when the backend is currently reachable. Used for degraded-mode
	/// observability; never widens what a caller outside this process can see.
	fn healthy(&self) -> bool;
}

/// Convenience helpers built on top of [`SharedCache`] for JSON-serializable values.
pub trait SharedCacheExt: SharedCache {
	/// Fetches and deserializes the value stored at `key`.
	fn get_json<'a, T>(&'a self, key: &'a str) -> Pin<Box<dyn Future<Output = Result<Option<T>, CacheError>> + 'a + Send>>
	where
		T: serde::de::DeserializeOwned + 'a,
	{
		Box::pin(async move {
			match self.get(key).await? {
				Some(bytes) => {
					let value = serde_json::from_slice(&bytes)
						.map_err(|e| CacheError::Serialization { message: e.to_string() })?;

					Ok(Some(value))
				},
				None => Ok(None),
			}
		})
	}

	/// Serializes and stores `value` at `key` with the given TTL.
	fn set_json<'a, T>(
		&'a self,
		key: &'a str,
		value: &T,
		ttl: Duration,
	) -> Pin<Box<dyn Future<Output = Result<(), CacheError>> + 'a + Send>>
	where
		T: serde::Serialize + Sync,
	{
		let encoded = serde_json::to_vec(value).map_err(|e| CacheError::Serialization { message: e.to_string() });

		Box::pin(async move {
			self.set(key, encoded?, ttl).await
		})
	}
}
impl<T: SharedCache + ?Sized> SharedCacheExt for T {}
