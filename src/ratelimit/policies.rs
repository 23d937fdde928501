//! Concrete [`super::RateLimitPolicy`] implementations.
//!
//! `SlidingWindowPolicy` and `TokenBucketPolicy` both wrap `governor`'s GCRA limiter, which
//! already implements a continuously sliding window with an optional burst allowance — the
//! distinction between the two strategies is only in how the quota is shaped from `(limit,
//! period)`. `ConcurrencyPolicy` and `FixedWindowPolicy` have no equivalent in `governor` and
//! are hand-rolled over a plain counter.

// std
use std::num::NonZeroU32;
// crates.io
use governor::{Quota, RateLimiter as GovernorLimiter, clock::Clock, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
// self
use crate::{_prelude::*, ratelimit::RateLimitDecision};

type Keyed = GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

fn quota_for(limit: u32, period: Duration) -> Quota {
	let limit = NonZeroU32::new(limit.max(1)).unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
	let period_std = period.unsigned_abs();
	let period_per_cell = (period_std / limit.get()).max(std::time::Duration::from_millis(1));

	Quota::with_period(period_per_cell).unwrap_or_else(|| Quota::per_second(limit)).allow_burst(limit)
}

fn deny_after(clock: &DefaultClock, not_until: governor::NotUntil<<DefaultClock as Clock>::Instant>) -> RateLimitDecision {
	let wait = not_until.wait_time_from(clock.now());

	RateLimitDecision::Deny { retry_after_secs: wait.as_secs().max(1) }
}

/// `M` requests per `W` seconds, continuously sliding (via `governor`'s GCRA).
pub struct SlidingWindowPolicy {
	limiter: Keyed,
	clock: DefaultClock,
}
impl SlidingWindowPolicy {
	/// Permits `limit` requests per `period`, refilling continuously.
	pub fn new(limit: u32, period: Duration) -> Self {
		let clock = DefaultClock::default();

		Self { limiter: GovernorLimiter::keyed(quota_for(limit, period)), clock }
	}
}
impl super::RateLimitPolicy for SlidingWindowPolicy {
	fn check(&self, key: &str) -> RateLimitDecision {
		match self.limiter.check_key(&key.to_owned()) {
			Ok(()) => RateLimitDecision::Allow,
			Err(not_until) => deny_after(&self.clock, not_until),
		}
	}
}

/// Capacity `C`, refilled over `period`; same GCRA mechanics as [`SlidingWindowPolicy`] but
/// framed as a bucket the caller can burst-drain and must wait to refill.
pub struct TokenBucketPolicy {
	limiter: Keyed,
	clock: DefaultClock,
}
impl TokenBucketPolicy {
	/// Builds a bucket of `capacity` tokens, refilled fully over `period`.
	pub fn new(capacity: u32, period: Duration) -> Self {
		let clock = DefaultClock::default();

		Self { limiter: GovernorLimiter::keyed(quota_for(capacity, period)), clock }
	}
}
impl super::RateLimitPolicy for TokenBucketPolicy {
	fn check(&self, key: &str) -> RateLimitDecision {
		match self.limiter.check_key(&key.to_owned()) {
			Ok(()) => RateLimitDecision::Allow,
			Err(not_until) => deny_after(&self.clock, not_until),
		}
	}
}

/// At most `N` in-flight requests per key. `governor` has no concept of concurrency caps, so
/// this is a plain saturating counter guarded by a mutex.
pub struct ConcurrencyPolicy {
	max_in_flight: u32,
	in_flight: Mutex<HashMap<String, u32>>,
}
impl ConcurrencyPolicy {
	/// Permits at most `max_in_flight` concurrent admissions per key.
	pub fn new(max_in_flight: u32) -> Self {
		Self { max_in_flight, in_flight: Mutex::new(HashMap::new()) }
	}
}
impl super::RateLimitPolicy for ConcurrencyPolicy {
	fn check(&self, key: &str) -> RateLimitDecision {
		let mut table = self.in_flight.lock();
		let count = table.entry(key.to_owned()).or_insert(0);

		if *count < self.max_in_flight {
			*count += 1;

			RateLimitDecision::Allow
		} else {
			RateLimitDecision::Deny { retry_after_secs: 1 }
		}
	}

	fn release(&self, key: &str) {
		let mut table = self.in_flight.lock();

		if let Some(count) = table.get_mut(key) {
			*count = count.saturating_sub(1);

			if *count == 0 {
				table.remove(key);
			}
		}
	}
}

/// `M` requests per `W`-second window, aligned to wall-clock boundaries (unlike
/// [`SlidingWindowPolicy`], a burst at the very end of one window and the very start of the
/// next can together exceed `M` within any rolling `W`-second span — an accepted tradeoff for
/// the simplicity of a single counter reset per boundary).
pub struct FixedWindowPolicy {
	limit: u32,
	period: Duration,
	windows: Mutex<HashMap<String, (i64, u32)>>,
}
impl FixedWindowPolicy {
	/// Permits `limit` requests per wall-clock-aligned `period`.
	pub fn new(limit: u32, period: Duration) -> Self {
		Self { limit, period, windows: Mutex::new(HashMap::new()) }
	}

	fn window_index(&self, now: OffsetDateTime) -> i64 {
		let period_secs = self.period.whole_seconds().max(1);

		now.unix_timestamp() / period_secs
	}
}
impl super::RateLimitPolicy for FixedWindowPolicy {
	fn check(&self, key: &str) -> RateLimitDecision {
		let current_window = self.window_index(OffsetDateTime::now_utc());
		let mut table = self.windows.lock();
		let entry = table.entry(key.to_owned()).or_insert((current_window, 0));

		if entry.0 != current_window {
			*entry = (current_window, 0);
		}

		if entry.1 < self.limit {
			entry.1 += 1;

			RateLimitDecision::Allow
		} else {
			let period_secs = self.period.whole_seconds().max(1);
			let window_start = current_window * period_secs;
			let retry_after_secs = (window_start + period_secs - OffsetDateTime::now_utc().unix_timestamp()).max(1) as u64;

			RateLimitDecision::Deny { retry_after_secs }
		}
	}
}
