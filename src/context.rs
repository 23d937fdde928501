//! Explicit per-request context, replacing ambient thread/async-local state.
//!
//! Every function that may block, log, or call downstream threads a [`RequestContext`]
//! explicitly rather than reaching for a thread-local or task-local — the concrete
//! realization of the "per-request ambient state → explicit request context" redesign flag.

// crates.io
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
// self
use crate::{_prelude::*, auth::Principal};

/// The request-scoped cache layer Module B names alongside the process-wide
/// [`SharedCache`](crate::cache::SharedCache): lifetime is exactly one request, it is never
/// shared across requests, and values are stored as-is with no serialization step. Cheap to
/// clone — clones of the same [`RequestContext`] (e.g. across a fan-out of sub-tasks that
/// must join before the response) share one underlying map.
#[derive(Clone, Default)]
pub struct RequestCache {
	entries: Arc<Mutex<HashMap<String, Arc<[u8]>>>>,
}
impl RequestCache {
	/// Builds an empty request-scoped cache.
	pub fn new() -> Self {
		Self::default()
	}

	/// Fetches the value stored at `key` for this request, if any.
	pub fn get(&self, key: &str) -> Option<Arc<[u8]>> {
		self.entries.lock().get(key).cloned()
	}

	/// Stores `value` at `key` for the remainder of this request. No TTL — the whole map is
	/// dropped with the request.
	pub fn set(&self, key: impl Into<String>, value: impl Into<Arc<[u8]>>) {
		self.entries.lock().insert(key.into(), value.into());
	}

	/// Removes the value stored at `key` for this request, if any.
	pub fn remove(&self, key: &str) {
		self.entries.lock().remove(key);
	}

	/// Returns `true` when `key` currently holds a value in this request's cache.
	pub fn exists(&self, key: &str) -> bool {
		self.entries.lock().contains_key(key)
	}
}

/// Carries the identity, deadline, and cancellation signal for a single inbound request
/// through every function that may block, log, or call a downstream system.
#[derive(Clone)]
pub struct RequestContext {
	/// Opaque identifier correlating every log line and `ProblemResponse` for this request.
	pub correlation_id: Uuid,
	/// Absolute instant by which a response must be produced.
	pub deadline: tokio::time::Instant,
	/// The authenticated caller, once (A) has run; `None` before validation or for
	/// anonymous routes.
	pub principal: Option<Principal>,
	/// Cooperative cancellation signal; every awaited downstream call MUST select against
	/// this alongside its own timeout.
	pub cancellation: CancellationToken,
	/// Request-scoped cache layer (Module B's layer 1); distinct from the process-wide
	/// shared cache (layer 2) every collaborator reaches via `Arc<dyn SharedCache>`.
	pub request_cache: RequestCache,
}
impl RequestContext {
	/// Builds a new context with a fresh correlation id and cancellation token, with a
	/// deadline `budget` from now.
	pub fn new(budget: std::time::Duration) -> Self {
		Self {
			correlation_id: Uuid::new_v4(),
			deadline: tokio::time::Instant::now() + budget,
			principal: None,
			cancellation: CancellationToken::new(),
			request_cache: RequestCache::new(),
		}
	}

	/// Returns the time remaining until [`Self::deadline`], or `Duration::ZERO` if it has
	/// already passed.
	pub fn remaining(&self) -> std::time::Duration {
		self.deadline.saturating_duration_since(tokio::time::Instant::now())
	}

	/// Clamps `configured` to whatever budget remains on the request deadline, so a single
	/// outbound attempt can never outlive the request it serves.
	pub fn clamp_timeout(&self, configured: std::time::Duration) -> std::time::Duration {
		configured.min(self.remaining())
	}

	/// Returns `true` once the request has been cancelled (client disconnect, or the caller
	/// invoked [`CancellationToken::cancel`] on [`Self::cancellation`]).
	pub fn is_cancelled(&self) -> bool {
		self.cancellation.is_cancelled()
	}

	/// Attaches a validated principal, as produced by the token validator.
	pub fn with_principal(mut self, principal: Principal) -> Self {
		self.principal = Some(principal);

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clamp_timeout_never_exceeds_remaining_budget() {
		let ctx = RequestContext::new(std::time::Duration::from_millis(50));

		std::thread::sleep(std::time::Duration::from_millis(10));

		let clamped = ctx.clamp_timeout(std::time::Duration::from_secs(30));

		assert!(clamped < std::time::Duration::from_secs(30));
	}

	#[test]
	fn cancellation_propagates_through_clone() {
		let ctx = RequestContext::new(std::time::Duration::from_secs(1));
		let clone = ctx.clone();

		ctx.cancellation.cancel();

		assert!(clone.is_cancelled());
	}

	#[test]
	fn request_cache_holds_values_for_the_life_of_the_context() {
		let cache = RequestCache::new();

		assert!(!cache.exists("k"));

		cache.set("k", Arc::from(b"v".as_slice()));

		assert!(cache.exists("k"));
		assert_eq!(cache.get("k").as_deref(), Some(b"v".as_slice()));

		cache.remove("k");

		assert!(!cache.exists("k"));
	}

	#[test]
	fn request_cache_is_shared_across_clones_of_the_same_context() {
		let ctx = RequestContext::new(std::time::Duration::from_secs(1));
		let clone = ctx.clone();

		ctx.request_cache.set("k", Arc::from(b"v".as_slice()));

		assert_eq!(clone.request_cache.get("k").as_deref(), Some(b"v".as_slice()));
	}
}
