//! Per-attempt timeout enforcement, the outermost layer of the resilience fabric.

// self
use crate::{_prelude::*, error::TransportError};

/// Wraps a future with a fixed deadline, mapping expiry into [`TransportError::Timeout`].
#[derive(Clone, Copy, Debug)]
pub struct TimeoutPolicy {
	duration: Duration,
}
impl TimeoutPolicy {
	/// Builds a policy enforcing `duration` per attempt.
	pub fn new(duration: Duration) -> Self {
		Self { duration }
	}

	/// Clamps this policy's duration to at most `deadline`, used when a request-scoped
	/// deadline is tighter than the configured per-attempt timeout.
	pub fn clamped_to(self, deadline: Duration) -> Self {
		if deadline < self.duration { Self { duration: deadline } } else { self }
	}

	/// Runs `fut`, converting expiry into [`crate::error::Error::Transport`].
	pub async fn run<T>(
		&self,
		fut: Pin<Box<dyn Future<Output = Result<T, Error>> + Send>>,
	) -> Result<T, Error> {
		let std_duration = std::time::Duration::from_millis(self.duration.whole_milliseconds().max(0) as u64);

		match tokio::time::timeout(std_duration, fut).await {
			Ok(result) => result,
			Err(_) => Err(TransportError::Timeout.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn expired_future_maps_to_timeout_error() {
		let policy = TimeoutPolicy::new(Duration::milliseconds(10));
		let result = policy
			.run(Box::pin(async {
				tokio::time::sleep(std::time::Duration::from_millis(50)).await;

				Ok::<_, Error>(())
			}))
			.await;

		assert!(matches!(result, Err(Error::Transport(TransportError::Timeout))));
	}

	#[tokio::test]
	async fn fast_future_resolves_normally() {
		let policy = TimeoutPolicy::new(Duration::milliseconds(50));
		let result = policy.run(Box::pin(async { Ok::<_, Error>(3) })).await;

		assert_eq!(result.unwrap(), 3);
	}
}
