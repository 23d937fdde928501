//! Networked shared cache backend built on `redis`, with an in-process fallback.

// crates.io
use redis::{AsyncCommands, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	cache::{CacheFuture, InProcessCache, SharedCache},
	error::CacheError,
};

/// Redis-backed [`SharedCache`]. Falls back to an in-process cache whenever the connection is
/// unreachable, rather than propagating every transient Redis error to callers; [`Self::healthy`]
/// exposes the degraded state so operators can observe it without widening what a caller
/// outside this process can see.
pub struct NetworkedCache {
	manager: RwLock<Option<ConnectionManager>>,
	client: redis::Client,
	fallback: InProcessCache,
}
impl NetworkedCache {
	/// Connects eagerly to `redis_url`; falls back to the in-process cache if the initial
	/// connection fails, retrying lazily on subsequent calls.
	pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
		let client = redis::Client::open(redis_url)
			.map_err(|e| CacheError::Backend { message: e.to_string() })?;
		let manager = client.get_connection_manager().await.ok();

		Ok(Self { manager: RwLock::new(manager), client, fallback: InProcessCache::default() })
	}

	async fn connection(&self) -> Option<ConnectionManager> {
		if let Some(manager) = self.manager.read().clone() {
			return Some(manager);
		}

		let manager = self.client.get_connection_manager().await.ok()?;

		*self.manager.write() = Some(manager.clone());

		Some(manager)
	}

	fn mark_unreachable(&self) {
		*self.manager.write() = None;
	}
}
impl SharedCache for NetworkedCache {
	fn get<'a>(&'a self, key: &'a str) -> CacheFuture<'a, Option<Vec<u8>>> {
		Box::pin(async move {
			let Some(mut manager) = self.connection().await else {
				return self.fallback.get(key).await;
			};

			match manager.get::<_, Option<Vec<u8>>>(key).await {
				Ok(value) => Ok(value),
				Err(_) => {
					self.mark_unreachable();
					self.fallback.get(key).await
				},
			}
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let ttl_secs = ttl.whole_seconds().max(1) as u64;
			let Some(mut manager) = self.connection().await else {
				return self.fallback.set(key, value, ttl).await;
			};

			match manager.set_ex::<_, _, ()>(key, value.clone(), ttl_secs).await {
				Ok(()) => Ok(()),
				Err(_) => {
					self.mark_unreachable();
					self.fallback.set(key, value, ttl).await
				},
			}
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> CacheFuture<'a, ()> {
		Box::pin(async move {
			let Some(mut manager) = self.connection().await else {
				return self.fallback.remove(key).await;
			};

			match manager.del::<_, ()>(key).await {
				Ok(()) => Ok(()),
				Err(_) => {
					self.mark_unreachable();
					self.fallback.remove(key).await
				},
			}
		})
	}

	fn exists<'a>(&'a self, key: &'a str) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let Some(mut manager) = self.connection().await else {
				return self.fallback.exists(key).await;
			};

			match manager.exists::<_, bool>(key).await {
				Ok(value) => Ok(value),
				Err(_) => {
					self.mark_unreachable();
					self.fallback.exists(key).await
				},
			}
		})
	}

	fn set_if_absent<'a>(&'a self, key: &'a str, value: Vec<u8>, ttl: Duration) -> CacheFuture<'a, bool> {
		Box::pin(async move {
			let ttl_secs = ttl.whole_seconds().max(1) as u64;
			let Some(mut manager) = self.connection().await else {
				return self.fallback.set_if_absent(key, value, ttl).await;
			};
			let opts = redis::SetOptions::default()
				.conditional_set(redis::ExistenceCheck::NX)
				.with_expiration(redis::SetExpiry::EX(ttl_secs));

			match manager.set_options::<_, _, Option<String>>(key, value.clone(), opts).await {
				Ok(reply) => Ok(reply.is_some()),
				Err(_) => {
					self.mark_unreachable();
					self.fallback.set_if_absent(key, value, ttl).await
				},
			}
		})
	}

	fn healthy(&self) -> bool {
		self.manager.read().is_some()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn unreachable_backend_falls_back_in_process() {
		// An unreachable host should make the cache degrade to the in-process fallback
		// rather than propagate a connection error to callers.
		let cache = NetworkedCache {
			manager: RwLock::new(None),
			client: redis::Client::open("redis://127.0.0.1:1").unwrap(),
			fallback: InProcessCache::default(),
		};

		cache.fallback.set("k", b"v".to_vec(), Duration::seconds(60)).await.unwrap();

		assert!(!cache.healthy());
		assert_eq!(cache.fallback.get("k").await.unwrap(), Some(b"v".to_vec()));
	}
}
