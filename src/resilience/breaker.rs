//! Per-host circuit breaker state machine: Closed → Open → HalfOpen → Closed.

// self
use crate::_prelude::*;

/// Circuit breaker lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
	/// Calls pass through normally; failures accumulate toward the threshold.
	Closed,
	/// Calls are rejected immediately until `open_state` elapses.
	Open,
	/// A single probe call is allowed through to decide whether to close or re-open.
	HalfOpen,
}
impl BreakerState {
	/// Stable label for metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			BreakerState::Closed => "closed",
			BreakerState::Open => "open",
			BreakerState::HalfOpen => "half_open",
		}
	}
}

/// Point-in-time view of a breaker, exposed for health checks.
#[derive(Clone, Copy, Debug)]
pub struct BreakerSnapshot {
	/// Current state.
	pub state: BreakerState,
	/// Consecutive failures observed since the last success.
	pub consecutive_failures: u32,
}

/// A single host's breaker. Not `Send`-shared directly; held behind the fabric's mutex-guarded
/// map instead, mirroring the way the exchanger guards its singleflight map.
pub struct CircuitBreaker {
	state: BreakerState,
	consecutive_failures: u32,
	opened_at: Option<OffsetDateTime>,
	half_open_probe_in_flight: bool,
}
impl CircuitBreaker {
	/// Builds a breaker starting in the closed state.
	pub fn closed() -> Self {
		Self {
			state: BreakerState::Closed,
			consecutive_failures: 0,
			opened_at: None,
			half_open_probe_in_flight: false,
		}
	}

	/// Returns the instant after which a half-open probe should be attempted, when the
	/// breaker currently blocks calls.
	pub fn blocks_at(&mut self, now: OffsetDateTime, open_state: Duration) -> Option<OffsetDateTime> {
		match self.state {
			BreakerState::Closed => None,
			BreakerState::HalfOpen => {
				if self.half_open_probe_in_flight { Some(now) } else {
					self.half_open_probe_in_flight = true;

					None
				}
			},
			BreakerState::Open => {
				let opened_at = self.opened_at.unwrap_or(now);

				if now >= opened_at + open_state {
					self.state = BreakerState::HalfOpen;
					self.half_open_probe_in_flight = true;

					None
				} else {
					Some(opened_at + open_state)
				}
			},
		}
	}

	/// Records a successful call, returning the new state when it changed.
	pub fn on_success(&mut self) -> Option<BreakerState> {
		self.half_open_probe_in_flight = false;
		self.consecutive_failures = 0;

		let previous = self.state;

		self.state = BreakerState::Closed;
		self.opened_at = None;

		if previous != self.state { Some(self.state) } else { None }
	}

	/// Records a failed call, returning the new state when it changed.
	pub fn on_failure(&mut self, failure_threshold: u32, now: OffsetDateTime) -> Option<BreakerState> {
		self.half_open_probe_in_flight = false;

		let previous = self.state;

		match self.state {
			BreakerState::HalfOpen => {
				self.state = BreakerState::Open;
				self.opened_at = Some(now);
			},
			BreakerState::Closed => {
				self.consecutive_failures += 1;

				if self.consecutive_failures >= failure_threshold {
					self.state = BreakerState::Open;
					self.opened_at = Some(now);
				}
			},
			BreakerState::Open => {},
		}

		if previous != self.state { Some(self.state) } else { None }
	}

	/// Point-in-time snapshot for health checks.
	pub fn snapshot(&self) -> BreakerSnapshot {
		BreakerSnapshot { state: self.state, consecutive_failures: self.consecutive_failures }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn opens_after_threshold_consecutive_failures() {
		let mut breaker = CircuitBreaker::closed();
		let now = OffsetDateTime::now_utc();

		assert!(breaker.on_failure(3, now).is_none());
		assert!(breaker.on_failure(3, now).is_none());
		assert_eq!(breaker.on_failure(3, now), Some(BreakerState::Open));
	}

	#[test]
	fn half_open_failure_reopens_immediately() {
		let mut breaker = CircuitBreaker::closed();
		let now = OffsetDateTime::now_utc();

		breaker.on_failure(1, now);
		assert_eq!(breaker.snapshot().state, BreakerState::Open);

		breaker.blocks_at(now + Duration::seconds(60), Duration::seconds(30));
		assert_eq!(breaker.snapshot().state, BreakerState::HalfOpen);

		assert_eq!(breaker.on_failure(1, now), Some(BreakerState::Open));
	}

	#[test]
	fn success_from_half_open_closes() {
		let mut breaker = CircuitBreaker::closed();
		let now = OffsetDateTime::now_utc();

		breaker.on_failure(1, now);
		breaker.blocks_at(now + Duration::seconds(60), Duration::seconds(30));

		assert_eq!(breaker.on_success(), Some(BreakerState::Closed));
	}
}
