//! Bearer token validation against a JSON Web Key Set, with key-rotation tolerance.

// std
use std::time::Instant as StdInstant;
// crates.io
use arc_swap::ArcSwap;
use jsonwebtoken::{
	Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind as JwtErrorKind, jwk::JwkSet,
};
// self
use crate::{
	_prelude::*,
	auth::{ClaimValue, Principal, TokenSecret, UserId},
	error::AuthError,
};

/// Future returned by [`TokenValidator::validate`].
pub type ValidateFuture<'a> = Pin<Box<dyn Future<Output = Result<Principal, AuthError>> + 'a + Send>>;

/// Validates an inbound `Authorization` header and extracts the [`Principal`].
pub trait TokenValidator
where
	Self: Send + Sync,
{
	/// Validates the raw `Authorization` header value (e.g., `"Bearer eyJ..."`).
	fn validate<'a>(&'a self, raw_header: &'a str) -> ValidateFuture<'a>;
}

const ALLOWED_ALGORITHMS: &[Algorithm] =
	&[Algorithm::RS256, Algorithm::RS384, Algorithm::RS512, Algorithm::ES256, Algorithm::ES384];

fn bearer_token(raw_header: &str) -> Result<&str, AuthError> {
	raw_header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)
}

/// Classifies a `jsonwebtoken` decode failure into the specific [`AuthError`] variant the
/// error surfacer needs to pick a stable wire `kind`, rather than collapsing every validation
/// failure into one generic reason string.
fn classify_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
	match err.kind() {
		JwtErrorKind::ExpiredSignature => AuthError::ExpiredToken,
		JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidEcdsaKey | JwtErrorKind::InvalidRsaKey(_) =>
			AuthError::BadSignature,
		JwtErrorKind::InvalidAudience => AuthError::WrongAudience,
		JwtErrorKind::InvalidIssuer => AuthError::WrongIssuer,
		_ => AuthError::InvalidToken { reason: err.to_string() },
	}
}

/// A fetched, decoded key set plus the instant it was retrieved, swapped atomically by the
/// background refresh task so in-flight validations never observe a half-updated map.
struct KeySet {
	keys: HashMap<String, DecodingKey>,
	fetched_at: StdInstant,
}
impl KeySet {
	fn empty() -> Self {
		Self { keys: HashMap::new(), fetched_at: StdInstant::now() }
	}
}

/// JWKS-backed [`TokenValidator`]. Refreshes its key set on a fixed TTL and, once more, on an
/// unknown `kid` miss (tolerating key rotation without waiting out the TTL).
pub struct JwksTokenValidator {
	http_client: ReqwestClient,
	jwks_url: Url,
	issuer: String,
	audience: String,
	refresh_ttl: std::time::Duration,
	keys: ArcSwap<KeySet>,
	refresh_lock: AsyncMutex<()>,
}
impl JwksTokenValidator {
	/// Builds a validator pointed at `jwks_url`, enforcing the given issuer/audience.
	pub fn new(jwks_url: Url, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
		Self {
			http_client: ReqwestClient::new(),
			jwks_url,
			issuer: issuer.into(),
			audience: audience.into(),
			refresh_ttl: std::time::Duration::from_secs(300),
			keys: ArcSwap::from_pointee(KeySet::empty()),
			refresh_lock: AsyncMutex::new(()),
		}
	}

	/// Overrides the reqwest client used to fetch the key set (e.g., for tests).
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = client;

		self
	}

	/// Overrides the background refresh interval.
	pub fn with_refresh_ttl(mut self, ttl: std::time::Duration) -> Self {
		self.refresh_ttl = ttl;

		self
	}

	async fn refresh(&self) -> Result<(), AuthError> {
		let _guard = self.refresh_lock.lock().await;
		let response = self.http_client.get(self.jwks_url.clone()).send().await.map_err(|e| {
			AuthError::KeySetUnavailable { reason: e.to_string() }
		})?;
		let jwk_set: JwkSet = response.json().await.map_err(|e| AuthError::KeySetUnavailable {
			reason: format!("malformed JWKS document: {e}"),
		})?;
		let mut keys = HashMap::with_capacity(jwk_set.keys.len());

		for jwk in &jwk_set.keys {
			let Some(kid) = jwk.common.key_id.clone() else { continue };
			let Ok(decoding_key) = DecodingKey::from_jwk(jwk) else { continue };

			keys.insert(kid, decoding_key);
		}

		self.keys.store(Arc::new(KeySet { keys, fetched_at: StdInstant::now() }));

		Ok(())
	}

	async fn ensure_fresh(&self) -> Result<(), AuthError> {
		let stale = self.keys.load().fetched_at.elapsed() > self.refresh_ttl
			|| self.keys.load().keys.is_empty();

		if stale {
			self.refresh().await?;
		}

		Ok(())
	}

	fn decoding_key_for(&self, kid: &str) -> Option<DecodingKey> {
		self.keys.load().keys.get(kid).cloned()
	}
}
impl TokenValidator for JwksTokenValidator {
	fn validate<'a>(&'a self, raw_header: &'a str) -> ValidateFuture<'a> {
		Box::pin(async move {
			let token = bearer_token(raw_header)?;
			let header = decode_header(token)
				.map_err(|e| AuthError::InvalidToken { reason: e.to_string() })?;

			if !ALLOWED_ALGORITHMS.contains(&header.alg) {
				return Err(AuthError::InvalidToken {
					reason: format!("algorithm {:?} is not permitted", header.alg),
				});
			}

			let kid = header.kid.ok_or(AuthError::MissingClaim { claim: "kid" })?;

			self.ensure_fresh().await?;

			let decoding_key = match self.decoding_key_for(&kid) {
				Some(key) => key,
				None => {
					// Unknown kid: the key set may have rotated since the last TTL refresh.
					// Force one refresh and retry exactly once before failing closed.
					self.refresh().await?;
					self.decoding_key_for(&kid).ok_or(AuthError::UnknownKey { kid: kid.clone() })?
				},
			};

			let mut validation = Validation::new(header.alg);

			validation.set_issuer(&[&self.issuer]);
			validation.set_audience(&[&self.audience]);

			let data = decode::<BTreeMap<String, serde_json::Value>>(token, &decoding_key, &validation)
				.map_err(classify_jwt_error)?;
			let claims = data.claims;
			let sub = claims
				.get("sub")
				.and_then(|v| v.as_str())
				.ok_or(AuthError::MissingClaim { claim: "sub" })?;
			let user_id = UserId::new(sub).map_err(|e| AuthError::InvalidToken { reason: e.to_string() })?;
			let display_name =
				claims.get("name").and_then(|v| v.as_str()).map(ToOwned::to_owned);
			let mapped_claims = claims
				.iter()
				.filter_map(|(k, v)| Some((k.clone(), json_to_claim(v)?)))
				.collect::<BTreeMap<_, _>>();

			Ok(Principal {
				user_id,
				display_name,
				assertion: TokenSecret::new(token),
				claims: Arc::new(mapped_claims),
			})
		})
	}
}

fn json_to_claim(value: &serde_json::Value) -> Option<ClaimValue> {
	match value {
		serde_json::Value::String(s) => Some(ClaimValue::Text(s.clone())),
		serde_json::Value::Bool(b) => Some(ClaimValue::Bool(*b)),
		serde_json::Value::Number(n) => n.as_i64().map(ClaimValue::Number),
		serde_json::Value::Array(items) =>
			Some(ClaimValue::List(items.iter().filter_map(|v| v.as_str().map(ToOwned::to_owned)).collect())),
		_ => None,
	}
}

/// Shared-secret (HS256) test double for integration tests; never wired in production.
pub struct StaticTokenValidator {
	secret: String,
	issuer: String,
	audience: String,
}
impl StaticTokenValidator {
	/// Builds a validator that checks HS256 tokens signed with `secret`.
	pub fn new(secret: impl Into<String>, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
		Self { secret: secret.into(), issuer: issuer.into(), audience: audience.into() }
	}
}
impl TokenValidator for StaticTokenValidator {
	fn validate<'a>(&'a self, raw_header: &'a str) -> ValidateFuture<'a> {
		Box::pin(async move {
			let token = bearer_token(raw_header)?;
			let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
			let mut validation = Validation::new(Algorithm::HS256);

			validation.set_issuer(&[&self.issuer]);
			validation.set_audience(&[&self.audience]);

			let data = decode::<BTreeMap<String, serde_json::Value>>(token, &decoding_key, &validation)
				.map_err(classify_jwt_error)?;
			let claims = data.claims;
			let sub = claims
				.get("sub")
				.and_then(|v| v.as_str())
				.ok_or(AuthError::MissingClaim { claim: "sub" })?;
			let user_id = UserId::new(sub).map_err(|e| AuthError::InvalidToken { reason: e.to_string() })?;

			Ok(Principal {
				user_id,
				display_name: None,
				assertion: TokenSecret::new(token),
				claims: Arc::new(BTreeMap::new()),
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bearer_token_requires_prefix() {
		assert!(bearer_token("Bearer abc").is_ok());
		assert!(bearer_token("Basic abc").is_err());
		assert!(bearer_token("Bearer ").is_err());
	}

	#[test]
	fn json_to_claim_skips_unsupported_shapes() {
		assert!(json_to_claim(&serde_json::Value::Null).is_none());
		assert!(json_to_claim(&serde_json::json!({"a": 1})).is_none());
		assert_eq!(json_to_claim(&serde_json::json!("x")), Some(ClaimValue::Text("x".into())));
		assert_eq!(
			json_to_claim(&serde_json::json!(["reader", "writer"])),
			Some(ClaimValue::List(vec!["reader".into(), "writer".into()]))
		);
	}
}
