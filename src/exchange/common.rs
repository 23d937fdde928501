//! Cache-key derivation and preemptive-refresh window helpers shared by the exchanger.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Derives the OBO cache key from the hashed assertion and the sorted, space-joined scope
/// list, mirroring the scope fingerprinting used elsewhere in the auth domain.
pub fn cache_key(assertion: &str, scopes: &[String]) -> String {
	let mut sorted = scopes.to_vec();

	sorted.sort();

	let mut hasher = Sha256::new();

	hasher.update(assertion.as_bytes());
	hasher.update(b"\0");
	hasher.update(sorted.join(" ").as_bytes());

	let digest = hasher.finalize();

	format!("obo:{}", STANDARD_NO_PAD.encode(digest))
}

/// Jittered preemptive-refresh decision: a cached entry with less than `window` (minus a
/// deterministic jitter derived from the key) remaining before expiry is treated as a miss,
/// spreading refreshes for identical keys across concurrent callers instead of having them
/// all expire on the same tick.
pub fn should_refresh(key: &str, expires_at: OffsetDateTime, now: OffsetDateTime, window: Duration) -> bool {
	if expires_at <= now {
		return true;
	}

	let effective_window = jittered_window(key, window);

	if effective_window.is_zero() {
		return false;
	}

	expires_at - now <= effective_window
}

fn jittered_window(key: &str, window: Duration) -> Duration {
	let window_secs = window.whole_seconds();

	if window_secs <= 1 {
		return Duration::ZERO;
	}

	let modulus = u64::try_from(window_secs).unwrap_or(u64::MAX);
	let mut hasher = DefaultHasher::new();

	key.hash(&mut hasher);

	let jitter_secs = hasher.finish() % modulus;
	let clamped = i64::try_from(jitter_secs).unwrap_or(0);

	window.checked_sub(Duration::seconds(clamped)).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn cache_key_is_order_independent_over_scopes() {
		let a = cache_key("assertion", &["b".into(), "a".into()]);
		let b = cache_key("assertion", &["a".into(), "b".into()]);

		assert_eq!(a, b);
	}

	#[test]
	fn cache_key_differs_for_different_assertions() {
		let a = cache_key("assertion-1", &["a".into()]);
		let b = cache_key("assertion-2", &["a".into()]);

		assert_ne!(a, b);
	}

	#[test]
	fn should_refresh_true_when_already_expired() {
		let now = OffsetDateTime::now_utc();

		assert!(should_refresh("k", now - Duration::seconds(1), now, Duration::seconds(60)));
	}

	#[test]
	fn should_refresh_false_when_far_from_expiry() {
		let now = OffsetDateTime::now_utc();

		assert!(!should_refresh("k", now + Duration::seconds(3_600), now, Duration::seconds(60)));
	}
}
