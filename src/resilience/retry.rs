//! Retry classification, exponential backoff with jitter, and Retry-After honoring.

// crates.io
use rand::Rng;
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{Error, ExchangeError, TransportError},
};

/// Decision returned by [`RetryPolicy::classify`].
#[derive(Clone, Copy, Debug)]
pub struct RetryDecision {
	/// Whether the error is safe to retry.
	pub should_retry: bool,
	/// When the upstream supplied an explicit Retry-After hint, honor it instead of the
	/// computed backoff.
	pub retry_after: Option<Duration>,
}

/// Exponential backoff with jitter, bounded by a maximum attempt count.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
	/// Maximum number of retries after the initial attempt.
	pub max_retries: u32,
	base_backoff: Duration,
}
impl RetryPolicy {
	/// Builds a policy retrying up to `max_retries` times with `base_backoff` as the first
	/// backoff step.
	pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
		Self { max_retries, base_backoff }
	}

	/// Classifies `err`, deciding whether it is safe to retry and surfacing any Retry-After
	/// hint it carries.
	pub fn classify(&self, err: &Error) -> RetryDecision {
		match err {
			Error::Transport(TransportError::Timeout) => RetryDecision { should_retry: true, retry_after: None },
			Error::Transport(TransportError::Network { .. }) =>
				RetryDecision { should_retry: true, retry_after: None },
			Error::Transport(TransportError::BreakerOpen { .. }) =>
				RetryDecision { should_retry: false, retry_after: None },
			Error::Exchange(ExchangeError::Transient { retry_after, .. }) =>
				RetryDecision { should_retry: true, retry_after: *retry_after },
			Error::Exchange(_) => RetryDecision { should_retry: false, retry_after: None },
			Error::Denied { .. } | Error::Unavailable | Error::RateLimited { .. } =>
				RetryDecision { should_retry: false, retry_after: None },
			_ => RetryDecision { should_retry: false, retry_after: None },
		}
	}

	/// Exponential backoff (`base * 2^attempt`) with up to 20% jitter, for the given
	/// zero-indexed attempt number. Jitter is drawn from the thread-local RNG so concurrent
	/// callers retrying the same attempt number don't all wake up on the same tick.
	pub fn backoff_for(&self, attempt_no: u32) -> Duration {
		let exponent = attempt_no.min(10);
		let scaled = self.base_backoff.whole_milliseconds().saturating_mul(1_i64 << exponent);
		let jitter_fraction: u32 = rand::rng().random_range(0..100);
		let jittered = scaled + (scaled * jitter_fraction as i128 / 500) as i64;

		Duration::milliseconds(jittered.max(0))
	}
}

/// Parses the `Retry-After` header, supporting both the delta-seconds and HTTP-date forms.
#[cfg(feature = "reqwest")]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn timeouts_are_retryable() {
		let policy = RetryPolicy::new(3, Duration::milliseconds(10));
		let decision = policy.classify(&Error::Transport(TransportError::Timeout));

		assert!(decision.should_retry);
	}

	#[test]
	fn breaker_open_is_not_retryable() {
		let policy = RetryPolicy::new(3, Duration::milliseconds(10));
		let decision =
			policy.classify(&Error::Transport(TransportError::BreakerOpen { host: "h".into(), retry_after_secs: 30 }));

		assert!(!decision.should_retry);
	}

	#[test]
	fn transient_exchange_errors_honor_retry_after_hint() {
		let policy = RetryPolicy::new(3, Duration::milliseconds(10));
		let err = Error::Exchange(ExchangeError::Transient {
			message: "slow down".into(),
			status: Some(429),
			retry_after: Some(Duration::seconds(5)),
		});
		let decision = policy.classify(&err);

		assert!(decision.should_retry);
		assert_eq!(decision.retry_after, Some(Duration::seconds(5)));
	}

	#[test]
	fn backoff_grows_with_attempt_number() {
		let policy = RetryPolicy::new(5, Duration::milliseconds(100));

		assert!(policy.backoff_for(1) >= policy.backoff_for(0));
		assert!(policy.backoff_for(3) > policy.backoff_for(0));
	}
}
