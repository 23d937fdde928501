//! Outbound resilience fabric: per-attempt timeout, Retry-After-honoring retry with
//! exponential backoff and jitter, and a per-host circuit breaker, composed in that fixed
//! order in front of the transport.

pub mod breaker;
pub mod retry;
pub mod timeout;

pub use breaker::{BreakerSnapshot, BreakerState};
pub use retry::{RetryPolicy, parse_retry_after};
pub use timeout::TimeoutPolicy;

// self
use crate::{
	_prelude::*,
	error::{Error, TransportError},
	obs::{self, StageKind, record_breaker_transition},
};
use breaker::CircuitBreaker;

/// A transport call the fabric wraps: given nothing (callers close over their own request
/// state), returns the call's outcome.
pub type Attempt<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + 'a + Send>>;

/// Composes timeout, retry, and circuit-breaker policies around downstream HTTP calls.
///
/// One [`ResilienceFabric`] is shared (behind `Arc`) across every call to a given downstream
/// system; breaker state is tracked per host so one degraded host never opens the breaker for
/// another.
pub struct ResilienceFabric {
	timeout: TimeoutPolicy,
	retry: RetryPolicy,
	breakers: Mutex<HashMap<String, CircuitBreaker>>,
	failure_threshold: u32,
	open_state: Duration,
}
impl ResilienceFabric {
	/// Builds a fabric from the configured timeout/retry/breaker parameters.
	pub fn new(
		timeout: TimeoutPolicy,
		retry: RetryPolicy,
		failure_threshold: u32,
		open_state: Duration,
	) -> Self {
		Self { timeout, retry, breakers: Mutex::new(HashMap::new()), failure_threshold, open_state }
	}

	/// A fabric with short timeouts/backoffs, suitable for integration tests.
	pub fn for_tests() -> Self {
		Self::new(
			TimeoutPolicy::new(Duration::seconds(1)),
			RetryPolicy::new(2, Duration::milliseconds(10)),
			3,
			Duration::milliseconds(50),
		)
	}

	/// Runs `make_attempt` under the fabric: checks the breaker for `host`, enforces the
	/// per-attempt timeout, retries honoring any Retry-After hint the attempt's error
	/// carries, and records the outcome against the breaker.
	pub async fn call<T, F>(&self, host: &str, mut make_attempt: F) -> Result<T, Error>
	where
		F: FnMut() -> Attempt<'static, T>,
	{
		if let Some(blocked_until) = self.breaker_blocks(host) {
			let retry_after_secs = (blocked_until - OffsetDateTime::now_utc()).whole_seconds().max(0) as u64;

			return Err(Error::Transport(TransportError::BreakerOpen { host: host.to_owned(), retry_after_secs }));
		}

		let mut attempt_no = 0_u32;

		loop {
			obs::record_stage_outcome(StageKind::Downstream, obs::Outcome::Attempt);

			let outcome = self.timeout.run(make_attempt()).await;

			match outcome {
				Ok(value) => {
					self.record_success(host);
					obs::record_stage_outcome(StageKind::Downstream, obs::Outcome::Success);

					return Ok(value);
				},
				Err(err) => {
					let retryable = self.retry.classify(&err);

					self.record_failure(host);

					if !retryable.should_retry || attempt_no >= self.retry.max_retries {
						obs::record_stage_outcome(StageKind::Downstream, obs::Outcome::Failure);

						return Err(err);
					}

					// A Retry-After hint never shortens the wait below the computed backoff,
					// only ever extends it — the server's hint is a floor, not a ceiling.
					let backoff = retryable
						.retry_after
						.map(|ra| ra.max(self.retry.backoff_for(attempt_no)))
						.unwrap_or_else(|| self.retry.backoff_for(attempt_no));

					tokio::time::sleep(std::time::Duration::from_millis(
						backoff.whole_milliseconds().max(0) as u64,
					))
					.await;

					attempt_no += 1;
				},
			}
		}
	}

	fn breaker_blocks(&self, host: &str) -> Option<OffsetDateTime> {
		let mut breakers = self.breakers.lock();
		let breaker = breakers.entry(host.to_owned()).or_insert_with(CircuitBreaker::closed);

		breaker.blocks_at(OffsetDateTime::now_utc(), self.open_state)
	}

	fn record_success(&self, host: &str) {
		let mut breakers = self.breakers.lock();
		let breaker = breakers.entry(host.to_owned()).or_insert_with(CircuitBreaker::closed);
		let transitioned = breaker.on_success();

		if let Some(state) = transitioned {
			record_breaker_transition(host, state.as_str());
		}
	}

	fn record_failure(&self, host: &str) {
		let mut breakers = self.breakers.lock();
		let breaker = breakers.entry(host.to_owned()).or_insert_with(CircuitBreaker::closed);
		let transitioned = breaker.on_failure(self.failure_threshold, OffsetDateTime::now_utc());

		if let Some(state) = transitioned {
			record_breaker_transition(host, state.as_str());
		}
	}

	/// Returns a point-in-time snapshot of the breaker state for `host`, for health checks.
	pub fn breaker_snapshot(&self, host: &str) -> BreakerSnapshot {
		self.breakers.lock().entry(host.to_owned()).or_insert_with(CircuitBreaker::closed).snapshot()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn successful_call_does_not_retry() {
		let fabric = ResilienceFabric::for_tests();
		let calls = Arc::new(Mutex::new(0));
		let calls_clone = calls.clone();
		let result = fabric
			.call("graph.example", move || {
				let calls = calls_clone.clone();

				Box::pin(async move {
					*calls.lock() += 1;

					Ok::<_, Error>(7)
				})
			})
			.await;

		assert_eq!(result.unwrap(), 7);
		assert_eq!(*calls.lock(), 1);
	}

	#[tokio::test]
	async fn breaker_opens_after_threshold_failures() {
		let fabric = ResilienceFabric::for_tests();

		for _ in 0..10 {
			let _ = fabric
				.call("flaky.example", || {
					Box::pin(async {
						Err::<(), Error>(Error::Transport(TransportError::Timeout))
					})
				})
				.await;
		}

		let result = fabric
			.call("flaky.example", || Box::pin(async { Ok::<_, Error>(()) }))
			.await;

		assert!(matches!(result, Err(Error::Transport(TransportError::BreakerOpen { .. }))));
	}
}
