//! Per-route admission control: sliding-window, token-bucket, concurrency, and fixed-window
//! policies behind one [`RateLimitPolicy`] trait.

pub mod policies;

pub use policies::{ConcurrencyPolicy, FixedWindowPolicy, SlidingWindowPolicy, TokenBucketPolicy};

// self
use crate::{_prelude::*, config::RateLimitPolicyConfig, error::Error};

/// Decision returned by a policy's admission check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The caller may proceed.
	Allow,
	/// The caller exceeded the policy; retry no sooner than the carried duration.
	Deny {
		/// Seconds the caller should wait before retrying.
		retry_after_secs: u64,
	},
}

/// A single named admission-control strategy, keyed by caller identity.
///
/// Implementations MUST be cheap to call on every request and MUST NOT perform I/O; all state
/// is in-process (rate limiting is never shared across instances, matching the breaker's
/// per-process confinement).
pub trait RateLimitPolicy
where
	Self: Send + Sync,
{
	/// Checks whether `key` may proceed right now.
	fn check(&self, key: &str) -> RateLimitDecision;

	/// Releases a slot acquired by a prior `check` call. Only [`ConcurrencyPolicy`] does
	/// anything here; window- and bucket-based policies have nothing to give back.
	fn release(&self, key: &str) {
		let _ = key;
	}
}

/// RAII guard returned by [`RateLimiter::admit`]; releases the policy slot on drop so callers
/// cannot forget to release it on an early return.
pub struct RateLimitPermit<'a> {
	policy: &'a dyn RateLimitPolicy,
	key: String,
}
impl Drop for RateLimitPermit<'_> {
	fn drop(&mut self) {
		self.policy.release(&self.key);
	}
}

/// Registry of named policies, built once at startup from [`crate::config::RateLimitsConfig`]
/// and shared across every request.
pub struct RateLimiter {
	policies: BTreeMap<String, Box<dyn RateLimitPolicy>>,
}
impl RateLimiter {
	/// Builds a limiter with no policies registered; routes referencing an unregistered policy
	/// name fail closed via [`Self::admit`].
	pub fn new() -> Self {
		Self { policies: BTreeMap::new() }
	}

	/// Registers `policy` under `name`, replacing any existing policy with the same name.
	pub fn with_policy(mut self, name: impl Into<String>, policy: Box<dyn RateLimitPolicy>) -> Self {
		self.policies.insert(name.into(), policy);

		self
	}

	/// Builds a policy from its declarative configuration.
	pub fn build_policy(config: &RateLimitPolicyConfig) -> Box<dyn RateLimitPolicy> {
		use crate::config::RateLimitStrategyConfig::*;

		let period = Duration::seconds(config.period_secs as i64);

		match config.strategy {
			SlidingWindow => Box::new(SlidingWindowPolicy::new(config.limit, period)),
			TokenBucket => Box::new(TokenBucketPolicy::new(config.limit, period)),
			Concurrency => Box::new(ConcurrencyPolicy::new(config.limit)),
			FixedWindow => Box::new(FixedWindowPolicy::new(config.limit, period)),
		}
	}

	/// Checks the named policy for `key`, returning a guard that releases any held slot when
	/// dropped. An unregistered policy name is a configuration bug, not a caller error, and
	/// fails closed with [`Error::RateLimited`] rather than silently admitting the request.
	pub fn admit(&self, policy_name: &str, key: &str) -> Result<RateLimitPermit<'_>, Error> {
		let Some(policy) = self.policies.get(policy_name) else {
			return Err(Error::RateLimited { policy: policy_name.to_owned(), retry_after_secs: 1 });
		};

		match policy.check(key) {
			RateLimitDecision::Allow => Ok(RateLimitPermit { policy: policy.as_ref(), key: key.to_owned() }),
			RateLimitDecision::Deny { retry_after_secs } =>
				Err(Error::RateLimited { policy: policy_name.to_owned(), retry_after_secs }),
		}
	}
}
impl Default for RateLimiter {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unregistered_policy_fails_closed() {
		let limiter = RateLimiter::new();

		assert!(matches!(limiter.admit("graph-read", "user-1"), Err(Error::RateLimited { .. })));
	}

	#[test]
	fn registered_policy_admits_within_limit() {
		let limiter =
			RateLimiter::new().with_policy("graph-read", Box::new(FixedWindowPolicy::new(5, Duration::seconds(60))));

		assert!(limiter.admit("graph-read", "user-1").is_ok());
	}

	#[test]
	fn concurrency_permit_releases_on_drop() {
		let limiter = RateLimiter::new().with_policy("upload-heavy", Box::new(ConcurrencyPolicy::new(1)));

		{
			let _permit = limiter.admit("upload-heavy", "user-1").unwrap();

			assert!(limiter.admit("upload-heavy", "user-1").is_err());
		}

		assert!(limiter.admit("upload-heavy", "user-1").is_ok());
	}
}
