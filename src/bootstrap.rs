//! Composition root: builds every collaborator once at process start and hands handlers a
//! single `Services` struct to pull them from, instead of resolving dependencies from a
//! container at call time.

// self
use crate::{
	_prelude::*,
	access_source::{AccessDataSource, DataverseAccessDataSource},
	auth::validator::{JwksTokenValidator, TokenValidator},
	authz::AuthorizationEngine,
	cache::{InProcessCache, NetworkedCache, SharedCache},
	config::{CacheBackend, Settings},
	error::{ConfigError, Error},
	exchange::{SecretResolver, TokenExchanger},
	graph::GraphClientFactory,
	idempotency::IdempotencyLedger,
	ratelimit::RateLimiter,
	resilience::{ResilienceFabric, RetryPolicy, TimeoutPolicy},
};

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|e| ConfigError::InvalidUrl { source: e })
}

/// Every collaborator the mediation pipeline needs, built once from [`Settings`] and shared
/// (via `Arc`) across every request for the lifetime of the process.
pub struct Services {
	/// Verifies inbound bearer tokens and extracts the [`crate::auth::Principal`].
	pub token_validator: Arc<dyn TokenValidator>,
	/// Shared cache backing the token exchanger, access data source, and idempotency ledger.
	pub cache: Arc<dyn SharedCache>,
	/// Resilience fabric wrapping every outbound call.
	pub resilience: Arc<ResilienceFabric>,
	/// Executes and caches the OBO token exchange.
	pub exchanger: Arc<TokenExchanger>,
	/// Produces delegated/app-only Graph clients.
	pub graph: Arc<GraphClientFactory>,
	/// Fetches and caches per-resource access snapshots.
	pub access_source: Arc<dyn AccessDataSource>,
	/// The mandated authorization rule chain.
	pub authz_engine: Arc<AuthorizationEngine>,
	/// Registry of named rate-limit policies.
	pub rate_limiter: Arc<RateLimiter>,
	/// Dedup ledger for mutating endpoints and background workers.
	pub idempotency: Arc<IdempotencyLedger>,
}
impl Services {
	/// Builds every collaborator from `settings`, resolving the OBO client secret through
	/// `secret_resolver`. Fails closed: any misconfiguration (bad URL, unreachable secret
	/// store) aborts startup rather than running with a partially built pipeline.
	pub async fn build(settings: &Settings, secret_resolver: &dyn SecretResolver) -> Result<Self, Error> {
		let cache = Self::build_cache(settings).await?;
		let token_validator: Arc<dyn TokenValidator> = Arc::new(JwksTokenValidator::new(
			parse_url(&settings.auth.jwks_url)?,
			settings.auth.issuer.clone(),
			settings.auth.audience.clone(),
		));
		let resilience = Arc::new(ResilienceFabric::new(
			TimeoutPolicy::new(Duration::milliseconds(settings.resilience.timeout_ms as i64)),
			RetryPolicy::new(
				settings.resilience.max_retries,
				Duration::milliseconds(settings.resilience.base_backoff_ms as i64),
			),
			settings.resilience.failure_threshold,
			Duration::seconds(settings.resilience.open_state_secs as i64),
		));
		let client_secret = secret_resolver.resolve(&settings.exchange.client_secret_ref).await?;
		let exchanger = Arc::new(
			TokenExchanger::new(
				parse_url(&settings.exchange.token_endpoint)?,
				settings.exchange.client_id.clone(),
				client_secret,
				cache.clone(),
			)
			.with_safety_margin(Duration::seconds(settings.cache.obo_ttl_safety_margin_secs)),
		);
		let graph = Arc::new(GraphClientFactory::new(
			parse_url(&settings.downstream.graph_base_url)?,
			exchanger.clone(),
			resilience.clone(),
		));
		let access_source: Arc<dyn AccessDataSource> = Arc::new(DataverseAccessDataSource::new(
			parse_url(&settings.downstream.dataverse_base_url)?,
			cache.clone(),
			Duration::seconds(settings.cache.access_snapshot_ttl_secs),
			resilience.clone(),
		));
		let authz_engine = Arc::new(AuthorizationEngine::default_chain());
		let rate_limiter = Arc::new(Self::build_rate_limiter(settings));
		let idempotency = Arc::new(IdempotencyLedger::new(cache.clone()));

		Ok(Self {
			token_validator,
			cache,
			resilience,
			exchanger,
			graph,
			access_source,
			authz_engine,
			rate_limiter,
			idempotency,
		})
	}

	async fn build_cache(settings: &Settings) -> Result<Arc<dyn SharedCache>, Error> {
		match settings.cache.backend {
			CacheBackend::InProcess => Ok(Arc::new(InProcessCache::default())),
			CacheBackend::Networked => {
				let redis_url = settings.cache.redis_url.as_deref().ok_or_else(|| {
					Error::Config(ConfigError::Load {
						message: "cache.backend=networked requires cache.redis_url".to_owned(),
					})
				})?;

				Ok(Arc::new(NetworkedCache::connect(redis_url).await.map_err(Error::from)?))
			},
		}
	}

	fn build_rate_limiter(settings: &Settings) -> RateLimiter {
		settings.rate_limits.policies.iter().fold(RateLimiter::new(), |limiter, (name, policy)| {
			limiter.with_policy(name.clone(), RateLimiter::build_policy(policy))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		config::{
			AuthConfig, CacheConfig, DownstreamConfig, ExchangeConfig, RateLimitsConfig, ResilienceConfig,
		},
		exchange::StaticSecretResolver,
	};

	fn settings() -> Settings {
		Settings {
			auth: AuthConfig {
				jwks_url: "https://idp.example/keys".to_owned(),
				issuer: "https://idp.example/".to_owned(),
				audience: "api://sdap".to_owned(),
				jwks_refresh_secs: 300,
			},
			cache: CacheConfig {
				backend: CacheBackend::InProcess,
				redis_url: None,
				obo_ttl_safety_margin_secs: 60,
				access_snapshot_ttl_secs: 120,
				idempotency_ttl_secs: 86_400,
			},
			exchange: ExchangeConfig {
				token_endpoint: "https://idp.example/token".to_owned(),
				client_id: "client-1".to_owned(),
				client_secret_ref: "secret://client-1".to_owned(),
				default_scopes: vec!["https://graph.microsoft.com/.default".to_owned()],
			},
			resilience: ResilienceConfig {
				timeout_ms: 5_000,
				max_retries: 3,
				base_backoff_ms: 100,
				failure_threshold: 5,
				open_state_secs: 30,
			},
			rate_limits: RateLimitsConfig { policies: BTreeMap::new() },
			downstream: DownstreamConfig {
				graph_base_url: "https://graph.microsoft.com/v1.0/".to_owned(),
				dataverse_base_url: "https://dataverse.example/api/".to_owned(),
			},
		}
	}

	#[tokio::test]
	async fn builds_every_collaborator_for_in_process_cache() {
		let resolver = StaticSecretResolver::new("super-secret");
		let services = Services::build(&settings(), &resolver).await.unwrap();

		assert!(services.cache.healthy());
	}

	#[tokio::test]
	async fn networked_cache_without_redis_url_fails_closed() {
		let mut config = settings();

		config.cache.backend = CacheBackend::Networked;
		config.cache.redis_url = None;

		let resolver = StaticSecretResolver::new("super-secret");
		let result = Services::build(&config, &resolver).await;

		assert!(matches!(result, Err(Error::Config(ConfigError::Load { .. }))));
	}
}
