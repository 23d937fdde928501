//! Error types shared across validation, exchange, caching, and authorization.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs, fed into the problem-response surfacer.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Inbound bearer token failed validation.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Downstream token exchange failed.
	#[error(transparent)]
	Exchange(#[from] ExchangeError),
	/// Shared cache backend failure.
	#[error(transparent)]
	Cache(#[from] CacheError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS) talking to a downstream system.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The caller is not authorized to perform the requested operation.
	#[error("Access denied: {reason}.")]
	Denied {
		/// Human-readable reason, safe to log but not to expose verbatim to clients.
		reason: String,
	},
	/// A downstream dependency required to make the authorization decision is unavailable.
	#[error("A downstream dependency is unavailable.")]
	Unavailable,
	/// The caller exceeded an admission-control policy.
	#[error("Rate limit exceeded for policy `{policy}`.")]
	RateLimited {
		/// Name of the policy that rejected the request.
		policy: String,
		/// Seconds until the caller may retry.
		retry_after_secs: u64,
	},
	/// The same idempotency key was already used with a different payload.
	#[error("Idempotency key `{key}` was already used with a different request body.")]
	IdempotencyConflict {
		/// The offending idempotency key.
		key: String,
	},
	/// The requested resource does not exist.
	#[error("Resource not found.")]
	NotFound,
	/// The request conflicts with the current state of the resource.
	#[error("Request conflicts with the resource's current state.")]
	Conflict,
	/// A precondition on the request (e.g. an `If-Match` header) was not satisfied.
	#[error("Precondition not satisfied.")]
	PreconditionFailed,
}

/// Bearer token validation failures.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// No `Authorization` header, or it was not a bearer token.
	#[error("Missing or malformed Authorization header.")]
	MissingToken,
	/// Token signature, issuer, audience, or lifetime failed validation in a way not covered
	/// by a more specific variant below (malformed structure, unsupported algorithm, ...).
	#[error("Token failed validation: {reason}.")]
	InvalidToken {
		/// Validation failure reason.
		reason: String,
	},
	/// Token `exp` claim is in the past.
	#[error("Token has expired.")]
	ExpiredToken,
	/// Token signature did not verify against any known key.
	#[error("Token signature is invalid.")]
	BadSignature,
	/// Token `aud` claim does not match the configured audience.
	#[error("Token audience does not match the expected audience.")]
	WrongAudience,
	/// Token `iss` claim does not match the configured issuer.
	#[error("Token issuer does not match the expected issuer.")]
	WrongIssuer,
	/// Token key id is not present in the current or refreshed key set.
	#[error("Signing key `{kid}` is unknown.")]
	UnknownKey {
		/// Key id from the token header.
		kid: String,
	},
	/// The JWKS document could not be fetched or parsed.
	#[error("Failed to refresh signing keys: {reason}.")]
	KeySetUnavailable {
		/// Failure reason.
		reason: String,
	},
	/// Token is structurally valid but missing a required claim.
	#[error("Token is missing required claim `{claim}`.")]
	MissingClaim {
		/// Missing claim name.
		claim: &'static str,
	},
}

/// Failures raised while exchanging a user assertion for a downstream token.
#[derive(Debug, ThisError)]
pub enum ExchangeError {
	/// The requested scope set was never granted to this client; re-consent cannot fix this
	/// without an admin changing the app registration.
	#[error("Token lacks the required scopes: {reason}.")]
	ScopeNotGranted {
		/// Provider- or broker-supplied reason string.
		reason: String,
	},
	/// Inbound user assertion was rejected by the identity provider (bad audience, expired,
	/// wrong tenant). Distinct from a local validation failure because the rejection came
	/// from the downstream IdP's own check of the assertion, not ours.
	#[error("Identity provider rejected the inbound assertion: {reason}.")]
	AssertionRejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// The resource owner (or tenant admin) has not consented to this client's access.
	#[error("Consent is required before this exchange can succeed: {reason}.")]
	ConsentRequired {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// A conditional access or tenant policy blocked the grant.
	#[error("Identity provider policy blocked the grant: {reason}.")]
	PolicyBlocked {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Client authentication to the identity provider failed; a BFF misconfiguration, not
	/// attributable to the calling user.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Identity provider returned an unexpected but non-fatal response; safe to retry.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Transient {
		/// Provider-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Identity provider returned malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint response omitted `expires_in`, or it was out of range.
	#[error("Token endpoint returned an invalid expires_in value.")]
	InvalidExpiry,
}

/// Shared cache backend failures.
#[derive(Debug, ThisError)]
pub enum CacheError {
	/// Serialization failure while encoding/decoding a cached value.
	#[error("Cache serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the cache engine.
	#[error("Cache backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Settings failed to load or deserialize.
	#[error("Configuration could not be loaded: {message}.")]
	Load {
		/// Human-readable failure message.
		message: String,
	},
	/// A configured URL is invalid.
	#[error("Configuration contains an invalid URL.")]
	InvalidUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Descriptor does not enable the requested capability.
	#[error("Configuration does not enable `{capability}`.")]
	UnsupportedCapability {
		/// Capability label.
		capability: &'static str,
	},
	/// Requested identifier failed validation.
	#[error("Invalid identifier.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO) talking to a downstream system.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling a downstream service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling a downstream service.")]
	Io(#[from] std::io::Error),
	/// The call exceeded its deadline.
	#[error("Downstream call timed out.")]
	Timeout,
	/// The circuit breaker for this downstream host is open.
	#[error("Circuit breaker for `{host}` is open.")]
	BreakerOpen {
		/// Host the breaker is protecting.
		host: String,
		/// Seconds remaining until the breaker transitions to half-open and allows a probe.
		retry_after_secs: u64,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

impl Error {
	/// Stable, wire-facing kind string used by the problem-response surfacer. Matches the
	/// flat error-kind list (`urn:sdap:err:<kind>`); the grouping above this method is an
	/// internal, `#[from]`-chainable convenience only.
	pub fn problem_kind(&self) -> &'static str {
		match self {
			Error::Auth(AuthError::MissingToken) => "InvalidCredential",
			Error::Auth(AuthError::ExpiredToken) => "ExpiredToken",
			Error::Auth(AuthError::BadSignature) => "BadSignature",
			Error::Auth(AuthError::WrongAudience) => "WrongAudience",
			Error::Auth(AuthError::WrongIssuer) => "WrongIssuer",
			Error::Auth(_) => "InvalidCredential",
			Error::Exchange(ExchangeError::AssertionRejected { .. }) => "InvalidCredential",
			Error::Exchange(ExchangeError::ConsentRequired { .. }) => "ConsentRequired",
			Error::Exchange(ExchangeError::PolicyBlocked { .. }) => "PolicyBlocked",
			Error::Exchange(ExchangeError::ScopeNotGranted { .. }) => "ScopeNotGranted",
			Error::Exchange(ExchangeError::Transient { .. }) => "TransientIdpError",
			Error::Exchange(_) => "Unknown",
			Error::Cache(_) => "Unavailable",
			Error::Config(_) => "Unknown",
			Error::Transport(TransportError::Timeout) => "Timeout",
			Error::Transport(TransportError::BreakerOpen { .. }) => "CircuitOpen",
			Error::Transport(_) => "Unavailable",
			Error::NotFound => "NotFound",
			Error::Conflict => "Conflict",
			Error::PreconditionFailed => "PreconditionFailed",
			Error::Denied { .. } => "Deny",
			Error::Unavailable => "Unavailable",
			Error::RateLimited { .. } => "RateLimited",
			Error::IdempotencyConflict { .. } => "Conflict",
		}
	}
}
