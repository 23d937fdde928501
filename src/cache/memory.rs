//! In-process shared cache backend built on `moka`.

// crates.io
use moka::future::Cache;
// self
use crate::{_prelude::*, cache::SharedCache, error::CacheError};

/// TTL-aware in-process cache. Used when the configured cache backend is `in-process`, or as
/// the fallback layer inside [`super::NetworkedCache`] when the networked backend is
/// unreachable.
pub struct InProcessCache {
	entries: Cache<String, Arc<[u8]>>,
	// Per-key guards making `set_if_absent` a real atomic check-then-write instead of a
	// `get` followed by a `set`, mirroring the singleflight guard map in `exchange.rs`.
	key_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl InProcessCache {
	/// Builds a cache holding at most `max_capacity` entries. Per-entry TTL is honored by
	/// `moka`'s expiry policy, set on each [`SharedCache::set`] call via
	/// [`Cache::insert`] combined with a per-entry policy would require the `moka`
	/// `Expiry` trait; this implementation instead stores the expiry alongside the value and
	/// checks it on read, which keeps the eviction policy simple and backend-agnostic with
	/// [`super::NetworkedCache`].
	pub fn new(max_capacity: u64) -> Self {
		Self { entries: Cache::new(max_capacity), key_locks: Mutex::new(HashMap::new()) }
	}

	fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
		let mut locks = self.key_locks.lock();

		locks.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl Default for InProcessCache {
	fn default() -> Self {
		Self::new(100_000)
	}
}

#[derive(Clone)]
struct Entry {
	value: Vec<u8>,
	expires_at: OffsetDateTime,
}

fn encode_entry(entry: &Entry) -> Arc<[u8]> {
	let mut buf = Vec::with_capacity(entry.value.len() + 16);

	buf.extend_from_slice(&entry.expires_at.unix_timestamp().to_be_bytes());
	buf.extend_from_slice(&entry.value);

	buf.into()
}

fn decode_entry(bytes: &[u8]) -> Option<Entry> {
	if bytes.len() < 8 {
		return None;
	}

	let (stamp, value) = bytes.split_at(8);
	let stamp = i64::from_be_bytes(stamp.try_into().ok()?);
	let expires_at = OffsetDateTime::from_unix_timestamp(stamp).ok()?;

	Some(Entry { value: value.to_vec(), expires_at })
}

impl SharedCache for InProcessCache {
	fn get<'a>(&'a self, key: &'a str) -> crate::cache::CacheFuture<'a, Option<Vec<u8>>> {
		Box::pin(async move {
			let Some(raw) = self.entries.get(key).await else { return Ok(None) };
			let Some(entry) = decode_entry(&raw) else { return Ok(None) };

			if entry.expires_at <= OffsetDateTime::now_utc() {
				self.entries.invalidate(key).await;

				return Ok(None);
			}

			Ok(Some(entry.value))
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> crate::cache::CacheFuture<'a, ()> {
		Box::pin(async move {
			let entry = Entry { value, expires_at: OffsetDateTime::now_utc() + ttl };

			self.entries.insert(key.to_owned(), encode_entry(&entry)).await;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> crate::cache::CacheFuture<'a, ()> {
		Box::pin(async move {
			self.entries.invalidate(key).await;

			Ok(())
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> crate::cache::CacheFuture<'a, bool> {
		Box::pin(async move { Ok(self.get(key).await?.is_some()) })
	}

	fn set_if_absent<'a>(
		&'a self,
		key: &'a str,
		value: Vec<u8>,
		ttl: Duration,
	) -> crate::cache::CacheFuture<'a, bool> {
		Box::pin(async move {
			// Holding this per-key lock across the read and the write is what makes the
			// check-then-write atomic: two concurrent callers for the same key serialize
			// here instead of both observing absence.
			let lock = self.lock_for(key);
			let _guard = lock.lock().await;

			if self.get(key).await?.is_some() {
				return Ok(false);
			}

			self.set(key, value, ttl).await?;

			Ok(true)
		})
	}

	fn healthy(&self) -> bool {
		true
	}
}

impl From<moka::future::Cache<String, Arc<[u8]>>> for InProcessCache {
	fn from(entries: moka::future::Cache<String, Arc<[u8]>>) -> Self {
		Self { entries, key_locks: Mutex::new(HashMap::new()) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_then_get_round_trips() {
		let cache = InProcessCache::new(100);

		cache.set("k", b"v".to_vec(), Duration::seconds(60)).await.unwrap();

		assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
	}

	#[tokio::test]
	async fn expired_entries_read_as_missing() {
		let cache = InProcessCache::new(100);

		cache.set("k", b"v".to_vec(), Duration::seconds(-1)).await.unwrap();

		assert_eq!(cache.get("k").await.unwrap(), None);
	}

	#[tokio::test]
	async fn set_if_absent_only_writes_once() {
		let cache = InProcessCache::new(100);

		assert!(cache.set_if_absent("k", b"first".to_vec(), Duration::seconds(60)).await.unwrap());
		assert!(!cache.set_if_absent("k", b"second".to_vec(), Duration::seconds(60)).await.unwrap());
		assert_eq!(cache.get("k").await.unwrap(), Some(b"first".to_vec()));
	}
}
