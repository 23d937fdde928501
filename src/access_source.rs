//! Access data source: fetches effective permissions for a user × resource pair and shapes
//! them into an [`AccessSnapshot`], caching the result in the shared cache.

// self
use crate::{
	_prelude::*,
	auth::{AccessSnapshot, ResourceId, UserId},
	cache::{SharedCache, SharedCacheExt},
	error::Error,
	resilience::ResilienceFabric,
};

/// Future returned by [`AccessDataSource::get_access`].
pub type AccessFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessSnapshot, Error>> + 'a + Send>>;

/// Fetches the effective [`AccessSnapshot`] for a user × resource pair.
pub trait AccessDataSource
where
	Self: Send + Sync,
{
	/// Returns the effective access snapshot, consulting the cache first.
	fn get_access<'a>(&'a self, user: &'a UserId, resource: &'a ResourceId) -> AccessFuture<'a>;
}

fn snapshot_cache_key(user: &UserId, resource: &ResourceId) -> String {
	format!("access:{user}:{resource}")
}

/// Queries a Dataverse-backed metadata store over HTTP for effective permissions.
pub struct DataverseAccessDataSource {
	http_client: ReqwestClient,
	base_url: Url,
	cache: Arc<dyn SharedCache>,
	ttl: Duration,
	fabric: Arc<ResilienceFabric>,
	host_label: String,
}
impl DataverseAccessDataSource {
	/// Builds a data source against `base_url`, caching snapshots in `cache` for `ttl`. Outbound
	/// calls are wrapped by `fabric`, keyed on `base_url`'s host, so a degraded metadata store
	/// trips its own breaker independently of Graph or any other downstream.
	pub fn new(base_url: Url, cache: Arc<dyn SharedCache>, ttl: Duration, fabric: Arc<ResilienceFabric>) -> Self {
		let host_label = base_url.host_str().unwrap_or("dataverse").to_owned();

		Self { http_client: ReqwestClient::new(), base_url, cache, ttl, fabric, host_label }
	}
}
impl AccessDataSource for DataverseAccessDataSource {
	fn get_access<'a>(&'a self, user: &'a UserId, resource: &'a ResourceId) -> AccessFuture<'a> {
		Box::pin(async move {
			let key = snapshot_cache_key(user, resource);

			if let Some(cached) =
				self.cache.get_json::<AccessSnapshot>(&key).await.map_err(Error::from)?
			{
				return Ok(cached);
			}

			let url = self
				.base_url
				.join(&format!("accessgrants?user={user}&resource={resource}"))
				.map_err(|e| crate::error::ConfigError::InvalidUrl { source: e })?;
			let client = self.http_client.clone();
			let user = user.clone();
			let resource = resource.clone();

			let snapshot = self
				.fabric
				.call(&self.host_label, move || {
					let client = client.clone();
					let url = url.clone();
					let user = user.clone();
					let resource = resource.clone();

					Box::pin(async move {
						let response = client.get(url).send().await.map_err(crate::error::TransportError::from)?;

						if response.status() == reqwest::StatusCode::NOT_FOUND {
							Ok(AccessSnapshot::no_access(user, resource, OffsetDateTime::now_utc()))
						} else if response.status().is_success() {
							response
								.json::<AccessSnapshot>()
								.await
								.map_err(|e| crate::error::TransportError::from(e).into())
						} else {
							Err(Error::Unavailable)
						}
					})
				})
				.await?;

			self.cache.set_json(&key, &snapshot, self.ttl).await.map_err(Error::from)?;

			Ok(snapshot)
		})
	}
}

/// In-memory test double, backed by a plain map; never consults the shared cache.
#[derive(Default)]
pub struct StaticAccessDataSource {
	entries: RwLock<HashMap<(UserId, ResourceId), AccessSnapshot>>,
}
impl StaticAccessDataSource {
	/// Builds an empty test double.
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds a fixed snapshot for a user × resource pair.
	pub fn seed(&self, snapshot: AccessSnapshot) {
		self.entries.write().insert((snapshot.user_id.clone(), snapshot.resource_id.clone()), snapshot);
	}
}
impl AccessDataSource for StaticAccessDataSource {
	fn get_access<'a>(&'a self, user: &'a UserId, resource: &'a ResourceId) -> AccessFuture<'a> {
		Box::pin(async move {
			let key = (user.clone(), resource.clone());

			Ok(self
				.entries
				.read()
				.get(&key)
				.cloned()
				.unwrap_or_else(|| AccessSnapshot::no_access(user.clone(), resource.clone(), OffsetDateTime::now_utc())))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::AccessLevel;

	#[tokio::test]
	async fn static_source_returns_no_access_when_unseeded() {
		let source = StaticAccessDataSource::new();
		let snapshot = source
			.get_access(&UserId::new("u1").unwrap(), &ResourceId::new("r1").unwrap())
			.await
			.unwrap();

		assert_eq!(snapshot.access_level, AccessLevel::None);
	}

	#[tokio::test]
	async fn static_source_returns_seeded_snapshot() {
		let source = StaticAccessDataSource::new();
		let user = UserId::new("u1").unwrap();
		let resource = ResourceId::new("r1").unwrap();

		source.seed(AccessSnapshot {
			user_id: user.clone(),
			resource_id: resource.clone(),
			access_level: AccessLevel::Write,
			explicit_deny: false,
			team_memberships: BTreeSet::new(),
			team_access_level: AccessLevel::None,
			roles: BTreeSet::new(),
			source_timestamp: OffsetDateTime::now_utc(),
		});

		let snapshot = source.get_access(&user, &resource).await.unwrap();

		assert_eq!(snapshot.access_level, AccessLevel::Write);
	}
}
