//! On-behalf-of token exchange: trades a user assertion for a downstream (Graph) access
//! token, with a distributed cache and singleflight guards so concurrent callers for the same
//! assertion + scopes piggy-back on one in-flight exchange instead of stampeding the identity
//! provider.

pub mod common;

// self
use crate::{
	_prelude::*,
	auth::{Principal, TokenSecret},
	cache::{SharedCache, SharedCacheExt},
	error::{ConfigError, Error, ExchangeError},
};

const OBO_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const OBO_TOKEN_USE: &str = "on_behalf_of";

/// Resolves a configuration-level secret reference to its plaintext value, keeping the
/// exchanger itself ignorant of where secrets live.
pub trait SecretResolver
where
	Self: Send + Sync,
{
	/// Resolves `secret_ref` to its plaintext value.
	fn resolve<'a>(
		&'a self,
		secret_ref: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<String, ConfigError>> + 'a + Send>>;
}

/// Test/bootstrap double that returns a fixed secret regardless of the reference string.
pub struct StaticSecretResolver(String);
impl StaticSecretResolver {
	/// Builds a resolver that always returns `secret`.
	pub fn new(secret: impl Into<String>) -> Self {
		Self(secret.into())
	}
}
impl SecretResolver for StaticSecretResolver {
	fn resolve<'a>(
		&'a self,
		_secret_ref: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<String, ConfigError>> + 'a + Send>> {
		Box::pin(async move { Ok(self.0.clone()) })
	}
}

/// A cached downstream token entry, keyed by `common::cache_key`.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedObo {
	access_token_redacted: String,
	#[serde(with = "time::serde::rfc3339")]
	expires_at: OffsetDateTime,
	scopes: Vec<String>,
}

/// Resolved OBO token handed to callers; the raw value is always wrapped in [`TokenSecret`].
#[derive(Clone)]
pub struct OboToken {
	/// The delegated access token.
	pub access_token: TokenSecret,
	/// When the token expires.
	pub expires_at: OffsetDateTime,
	/// Scopes actually granted.
	pub scopes: Vec<String>,
}

/// Executes the OBO grant against an identity provider token endpoint, caching results and
/// coalescing concurrent identical exchanges.
pub struct TokenExchanger {
	http_client: ReqwestClient,
	token_endpoint: Url,
	client_id: String,
	client_secret: String,
	cache: Arc<dyn SharedCache>,
	guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
	safety_margin: Duration,
}
impl TokenExchanger {
	/// Builds an exchanger targeting `token_endpoint`, authenticating with `client_id` +
	/// `client_secret`, and caching results in `cache`.
	pub fn new(
		token_endpoint: Url,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		cache: Arc<dyn SharedCache>,
	) -> Self {
		Self {
			http_client: ReqwestClient::new(),
			token_endpoint,
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			cache,
			guards: Mutex::new(HashMap::new()),
			safety_margin: Duration::seconds(60),
		}
	}

	/// Overrides the jittered preemptive-refresh safety margin (defaults to 60 seconds).
	pub fn with_safety_margin(mut self, margin: Duration) -> Self {
		self.safety_margin = margin;

		self
	}

	fn guard_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}

	/// Exchanges `principal`'s assertion for a delegated token carrying `scopes`.
	pub async fn exchange(&self, principal: &Principal, scopes: &[String]) -> Result<OboToken, Error> {
		let assertion = principal.assertion.expose();
		let scope_list = scopes.to_vec();
		let key = common::cache_key(assertion, &scope_list);
		let guard = self.guard_for(&key);
		let _singleflight = guard.lock().await;
		let now = OffsetDateTime::now_utc();

		if let Some(cached) = self.cache.get_json::<CachedObo>(&key).await.map_err(Error::from)? {
			if !common::should_refresh(&key, cached.expires_at, now, self.safety_margin) {
				return Ok(OboToken {
					access_token: TokenSecret::new(cached.access_token_redacted),
					expires_at: cached.expires_at,
					scopes: cached.scopes,
				});
			}
		}

		let mut form = BTreeMap::new();

		form.insert("grant_type".to_owned(), OBO_GRANT_TYPE.to_owned());
		form.insert("client_id".to_owned(), self.client_id.clone());
		form.insert("client_secret".to_owned(), self.client_secret.clone());
		form.insert("assertion".to_owned(), assertion.to_owned());
		form.insert("requested_token_use".to_owned(), OBO_TOKEN_USE.to_owned());

		if !scope_list.is_empty() {
			form.insert("scope".to_owned(), scope_list.join(" "));
		}

		let token = self.post_token_request(form).await?;
		let ttl = token.expires_at - now;

		if ttl.is_positive() {
			let entry = CachedObo {
				access_token_redacted: token.access_token.expose().to_owned(),
				expires_at: token.expires_at,
				scopes: token.scopes.clone(),
			};

			self.cache.set_json(&key, &entry, ttl).await.map_err(Error::from)?;
		}

		Ok(token)
	}

	/// Obtains an app-only (client-credentials) token carrying `scopes`, bypassing the
	/// per-user cache namespace.
	pub async fn app_only_token(&self, scopes: &[String]) -> Result<TokenSecret, Error> {
		let key = common::cache_key(&self.client_id, scopes);
		let guard = self.guard_for(&key);
		let _singleflight = guard.lock().await;
		let now = OffsetDateTime::now_utc();

		if let Some(cached) = self.cache.get_json::<CachedObo>(&key).await.map_err(Error::from)? {
			if !common::should_refresh(&key, cached.expires_at, now, self.safety_margin) {
				return Ok(TokenSecret::new(cached.access_token_redacted));
			}
		}

		let mut form = BTreeMap::new();

		form.insert("grant_type".to_owned(), "client_credentials".to_owned());
		form.insert("client_id".to_owned(), self.client_id.clone());
		form.insert("client_secret".to_owned(), self.client_secret.clone());

		if !scopes.is_empty() {
			form.insert("scope".to_owned(), scopes.join(" "));
		}

		let token = self.post_token_request(form).await?;
		let ttl = token.expires_at - now;

		if ttl.is_positive() {
			let entry = CachedObo {
				access_token_redacted: token.access_token.expose().to_owned(),
				expires_at: token.expires_at,
				scopes: token.scopes.clone(),
			};

			self.cache.set_json(&key, &entry, ttl).await.map_err(Error::from)?;
		}

		Ok(token.access_token)
	}

	async fn post_token_request(&self, form: BTreeMap<String, String>) -> Result<OboToken, Error> {
		let response = self
			.http_client
			.post(self.token_endpoint.clone())
			.form(&form)
			.send()
			.await
			.map_err(crate::error::TransportError::from)?;
		let status = response.status();
		#[cfg(feature = "reqwest")]
		let retry_after = crate::resilience::parse_retry_after(response.headers());
		let body = response.bytes().await.map_err(crate::error::TransportError::from)?;

		if status.is_success() {
			let mut deserializer = serde_json::Deserializer::from_slice(&body);
			let parsed: RawTokenResponse = serde_path_to_error::deserialize(&mut deserializer)
				.map_err(|source| ExchangeError::ResponseParse { source, status: Some(status.as_u16()) })?;

			return map_token_response(parsed);
		}

		let raw_error: Option<RawErrorResponse> = serde_json::from_slice(&body).ok();

		Err(map_error_response(status.as_u16(), raw_error, retry_after).into())
	}
}

#[derive(Deserialize)]
struct RawTokenResponse {
	access_token: String,
	expires_in: i64,
	#[serde(default)]
	scope: Option<String>,
}

#[derive(Deserialize)]
struct RawErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn map_token_response(raw: RawTokenResponse) -> Result<OboToken, Error> {
	if raw.expires_in <= 0 {
		return Err(ExchangeError::InvalidExpiry.into());
	}

	let scopes = raw.scope.map(|s| s.split(' ').map(str::to_owned).collect()).unwrap_or_default();

	Ok(OboToken {
		access_token: TokenSecret::new(raw.access_token),
		expires_at: OffsetDateTime::now_utc() + Duration::seconds(raw.expires_in),
		scopes,
	})
}

fn map_error_response(status: u16, raw: Option<RawErrorResponse>, retry_after: Option<Duration>) -> ExchangeError {
	let (code, description) = match raw {
		Some(body) => (body.error, body.error_description),
		None => ("unknown_error".to_owned(), None),
	};
	let message = description.unwrap_or_else(|| format!("identity provider returned `{code}`"));

	match code.as_str() {
		"invalid_grant" => ExchangeError::AssertionRejected { reason: message },
		"consent_required" | "interaction_required" => ExchangeError::ConsentRequired { reason: message },
		"access_denied" | "policy_blocked" => ExchangeError::PolicyBlocked { reason: message },
		"invalid_client" | "unauthorized_client" => ExchangeError::InvalidClient { reason: message },
		"insufficient_scope" => ExchangeError::ScopeNotGranted { reason: message },
		_ => ExchangeError::Transient { message, status: Some(status), retry_after },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn invalid_grant_code_maps_to_assertion_rejected() {
		let raw = RawErrorResponse { error: "invalid_grant".into(), error_description: None };
		let mapped = map_error_response(400, Some(raw), None);

		assert!(matches!(mapped, ExchangeError::AssertionRejected { .. }));
	}

	#[test]
	fn consent_required_code_maps_to_consent_required() {
		let raw = RawErrorResponse { error: "consent_required".into(), error_description: None };
		let mapped = map_error_response(403, Some(raw), None);

		assert!(matches!(mapped, ExchangeError::ConsentRequired { .. }));
	}

	#[test]
	fn unknown_code_is_treated_as_transient() {
		let raw = RawErrorResponse { error: "temporarily_unavailable".into(), error_description: None };
		let mapped = map_error_response(503, Some(raw), Some(Duration::seconds(5)));

		assert!(matches!(mapped, ExchangeError::Transient { retry_after: Some(_), .. }));
	}

	#[test]
	fn zero_expiry_is_rejected() {
		let raw = RawTokenResponse { access_token: "abc".into(), expires_in: 0, scope: None };

		assert!(map_token_response(raw).is_err());
	}
}
