//! Layered configuration for the mediation pipeline: base file, environment overlay, and
//! `SDAP_`-prefixed environment variables, in increasing precedence.

// self
use crate::{_prelude::*, error::ConfigError};

/// Top-level settings tree, deserialized from layered configuration sources.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
	/// Bearer token validation settings.
	pub auth: AuthConfig,
	/// Shared cache backend settings.
	pub cache: CacheConfig,
	/// Downstream token exchange settings.
	pub exchange: ExchangeConfig,
	/// Resilience fabric settings.
	pub resilience: ResilienceConfig,
	/// Rate limiter policy settings.
	pub rate_limits: RateLimitsConfig,
	/// Downstream system base URLs.
	pub downstream: DownstreamConfig,
}

/// Base URLs for the downstream systems the core talks to. Neither endpoint's own wire
/// protocol is in scope here — only enough to construct the clients (D) and (F) wrap.
#[derive(Clone, Debug, Deserialize)]
pub struct DownstreamConfig {
	/// Base URL for the Graph (file store) API, e.g. `https://graph.microsoft.com/v1.0/`.
	pub graph_base_url: String,
	/// Base URL for the Dataverse-backed metadata store.
	pub dataverse_base_url: String,
}
impl Settings {
	/// Loads settings from `config/base.toml`, an optional `config/{env}.toml` overlay
	/// (`env` taken from `SDAP_ENV`, defaulting to `development`), and `SDAP_`-prefixed
	/// environment variables, highest precedence last.
	pub fn load() -> Result<Self, ConfigError> {
		let env = std::env::var("SDAP_ENV").unwrap_or_else(|_| "development".to_owned());
		let builder = config::Config::builder()
			.add_source(config::File::with_name("config/base").required(false))
			.add_source(config::File::with_name(&format!("config/{env}")).required(false))
			.add_source(config::Environment::with_prefix("SDAP").separator("__"));

		builder
			.build()
			.and_then(config::Config::try_deserialize)
			.map_err(|e| ConfigError::Load { message: e.to_string() })
	}
}

/// Bearer token validation settings.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
	/// JWKS document URL.
	pub jwks_url: String,
	/// Expected token issuer.
	pub issuer: String,
	/// Expected token audience.
	pub audience: String,
	/// JWKS refresh interval, in seconds.
	#[serde(default = "default_jwks_refresh_secs")]
	pub jwks_refresh_secs: u64,
}
const fn default_jwks_refresh_secs() -> u64 {
	300
}

/// Which backend implements [`crate::cache::SharedCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
	/// In-process, single-instance cache.
	InProcess,
	/// Redis-backed, shared across instances.
	Networked,
}

/// Shared cache backend settings.
#[derive(Clone, Debug, Deserialize)]
pub struct CacheConfig {
	/// Which backend to construct.
	pub backend: CacheBackend,
	/// Redis connection string; required when `backend` is `networked`.
	pub redis_url: Option<String>,
	/// TTL, in seconds, for cached OBO tokens below the safety margin.
	#[serde(default = "default_obo_ttl_secs")]
	pub obo_ttl_safety_margin_secs: i64,
	/// TTL, in seconds, for cached access snapshots.
	#[serde(default = "default_access_snapshot_ttl_secs")]
	pub access_snapshot_ttl_secs: i64,
	/// TTL, in seconds, for idempotency records.
	#[serde(default = "default_idempotency_ttl_secs")]
	pub idempotency_ttl_secs: i64,
}
const fn default_obo_ttl_secs() -> i64 {
	60
}
const fn default_access_snapshot_ttl_secs() -> i64 {
	120
}
const fn default_idempotency_ttl_secs() -> i64 {
	86_400
}

/// Downstream token exchange settings.
#[derive(Clone, Debug, Deserialize)]
pub struct ExchangeConfig {
	/// Identity provider token endpoint.
	pub token_endpoint: String,
	/// OAuth client id used to authenticate the exchange.
	pub client_id: String,
	/// Reference to the client secret; resolved through [`crate::exchange::SecretResolver`].
	pub client_secret_ref: String,
	/// Default scopes requested when a caller does not specify any.
	#[serde(default)]
	pub default_scopes: Vec<String>,
}

/// Resilience fabric settings, keyed by downstream host label.
#[derive(Clone, Debug, Deserialize)]
pub struct ResilienceConfig {
	/// Per-attempt timeout, in milliseconds.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Maximum retry attempts (excluding the initial attempt).
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	/// Base backoff, in milliseconds, before jitter.
	#[serde(default = "default_base_backoff_ms")]
	pub base_backoff_ms: u64,
	/// Consecutive failures before the breaker opens.
	#[serde(default = "default_failure_threshold")]
	pub failure_threshold: u32,
	/// Seconds the breaker stays open before probing in half-open state.
	#[serde(default = "default_open_state_secs")]
	pub open_state_secs: u64,
}
const fn default_timeout_ms() -> u64 {
	5_000
}
const fn default_max_retries() -> u32 {
	3
}
const fn default_base_backoff_ms() -> u64 {
	100
}
const fn default_failure_threshold() -> u32 {
	5
}
const fn default_open_state_secs() -> u64 {
	30
}

/// Rate limiter policy settings, keyed by policy name.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RateLimitsConfig {
	/// Named policies (e.g., `graph-read`, `graph-write`, `upload-heavy`).
	#[serde(default)]
	pub policies: BTreeMap<String, RateLimitPolicyConfig>,
}

/// A single named rate limit policy definition.
#[derive(Clone, Debug, Deserialize)]
pub struct RateLimitPolicyConfig {
	/// Strategy to construct.
	pub strategy: RateLimitStrategyConfig,
	/// Permitted requests per window/refill period.
	pub limit: u32,
	/// Window or refill period, in seconds.
	pub period_secs: u64,
}

/// Which rate limiting strategy a policy uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStrategyConfig {
	/// Sliding time window.
	SlidingWindow,
	/// Token bucket with steady refill.
	TokenBucket,
	/// Bounded in-flight concurrency.
	Concurrency,
	/// Fixed, wall-clock-aligned window.
	FixedWindow,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn cache_backend_parses_from_snake_case() {
		let value: CacheBackend = serde_json::from_str("\"in_process\"").unwrap();

		assert_eq!(value, CacheBackend::InProcess);
	}
}
