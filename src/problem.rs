//! Error Surfacer: converts every internal [`Error`] into the wire-exact `ProblemResponse`
//! shape, stamping the [`RequestContext`](crate::context::RequestContext)'s correlation id and
//! deriving the HTTP status from the stable `problem_kind()` string.

// self
use crate::{
	_prelude::*,
	error::{AuthError, Error, ExchangeError},
};

/// `application/problem+json` body, matching the wire-exact shape every failure class
/// converts to.
#[derive(Clone, Debug, Serialize)]
pub struct ProblemResponse {
	/// Stable URI identifying the error kind, e.g. `urn:sdap:err:ExpiredToken`.
	#[serde(rename = "type")]
	pub kind_uri: String,
	/// Short human phrase summarizing the failure.
	pub title: &'static str,
	/// HTTP status code this problem maps to.
	pub status: u16,
	/// Non-secret explanation. Redacted to a stable phrase when the internal kind is
	/// `Unknown` — the real error goes to `tracing::error!` only, never the wire.
	pub detail: String,
	/// Request path the failure occurred on.
	pub instance: String,
	/// Seconds until the caller may retry, when known.
	#[serde(skip_serializing_if = "Option::is_none", rename = "retryAfter")]
	pub retry_after: Option<u64>,
	/// Opaque identifier correlating this response with server-side logs.
	#[serde(rename = "correlationId")]
	pub correlation_id: String,
}
impl ProblemResponse {
	/// Builds a `ProblemResponse` for `err`, occurring while serving `instance` (the request
	/// path), stamped with `correlation_id`.
	pub fn from_error(err: &Error, instance: impl Into<String>, correlation_id: impl Into<String>) -> Self {
		let kind = err.problem_kind();
		let status = status_for(err);
		let title = title_for(kind);
		let detail = if kind == "Unknown" {
			"An internal error occurred.".to_owned()
		} else {
			err.to_string()
		};

		Self {
			kind_uri: format!("urn:sdap:err:{kind}"),
			title,
			status,
			detail,
			instance: instance.into(),
			retry_after: retry_after_for(err),
			correlation_id: correlation_id.into(),
		}
	}
}

/// Maps an [`Error`] to the HTTP status `spec.md` §4.J mandates.
fn status_for(err: &Error) -> u16 {
	match err {
		Error::Auth(
			AuthError::MissingToken
			| AuthError::InvalidToken { .. }
			| AuthError::ExpiredToken
			| AuthError::BadSignature
			| AuthError::WrongAudience
			| AuthError::WrongIssuer
			| AuthError::UnknownKey { .. }
			| AuthError::KeySetUnavailable { .. }
			| AuthError::MissingClaim { .. },
		) => 401,
		Error::Exchange(ExchangeError::AssertionRejected { .. }) => 401,
		Error::Exchange(
			ExchangeError::ConsentRequired { .. } | ExchangeError::PolicyBlocked { .. } | ExchangeError::ScopeNotGranted { .. },
		) => 403,
		Error::Exchange(ExchangeError::Transient { .. }) => 502,
		// InvalidClient/ResponseParse/InvalidExpiry are broker-side misconfiguration or
		// contract violations, not attributable to the calling user; `problem_kind()` already
		// classifies these as `Unknown`, so the status follows suit.
		Error::Exchange(ExchangeError::InvalidClient { .. } | ExchangeError::ResponseParse { .. } | ExchangeError::InvalidExpiry) => 500,
		Error::Denied { .. } => 403,
		Error::NotFound => 404,
		Error::RateLimited { .. } => 429,
		Error::Conflict | Error::IdempotencyConflict { .. } => 409,
		Error::PreconditionFailed => 412,
		Error::Transport(crate::error::TransportError::Timeout) => 504,
		Error::Transport(crate::error::TransportError::BreakerOpen { .. }) => 503,
		Error::Transport(_) => 503,
		Error::Unavailable => 503,
		Error::Cache(_) => 503,
		Error::Config(_) => 500,
	}
}

/// Short human phrase for each stable `problem_kind()` string.
fn title_for(kind: &str) -> &'static str {
	match kind {
		"InvalidCredential" => "Invalid credential",
		"ExpiredToken" => "Token expired",
		"BadSignature" => "Invalid token signature",
		"WrongAudience" => "Token audience mismatch",
		"WrongIssuer" => "Token issuer mismatch",
		"ConsentRequired" => "Consent required",
		"PolicyBlocked" => "Blocked by policy",
		"ScopeNotGranted" => "Insufficient scope",
		"Deny" => "Access denied",
		"NotFound" => "Not found",
		"RateLimited" => "Rate limit exceeded",
		"Conflict" => "Conflict",
		"PreconditionFailed" => "Precondition failed",
		"Timeout" => "Downstream timeout",
		"CircuitOpen" => "Downstream unavailable",
		"TransientIdpError" => "Identity provider unavailable",
		"Unavailable" => "Service unavailable",
		_ => "Internal error",
	}
}

/// Extracts a `Retry-After` hint, when the error carries one.
fn retry_after_for(err: &Error) -> Option<u64> {
	match err {
		Error::RateLimited { retry_after_secs, .. } => Some(*retry_after_secs),
		Error::Exchange(ExchangeError::Transient { retry_after: Some(d), .. }) => Some(d.whole_seconds().max(0) as u64),
		Error::Transport(crate::error::TransportError::BreakerOpen { retry_after_secs, .. }) =>
			Some(*retry_after_secs),
		_ => None,
	}
}
