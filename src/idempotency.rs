//! Idempotency Ledger: short-lived dedup records over the shared cache, keyed by an
//! `Idempotency-Key` header value (or a background worker's own message id).
//!
//! A key is recorded the first time it is seen with no completed result attached yet; a
//! second admission of the same key within the TTL either replays the stored result (once
//! the original request completed) or reports a conflict (the original is still in flight).
//! The check-then-write step uses [`SharedCache::set_if_absent`] rather than a
//! read-then-write, so two concurrent callers racing on the same key cannot both believe
//! they are first.

// self
use crate::{
	_prelude::*,
	cache::{SharedCache, SharedCacheExt},
	error::Error,
};

/// What happened when a caller presented an idempotency key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmitOutcome {
	/// This key has not been seen before (or its prior record expired); the caller should
	/// proceed and call [`IdempotencyLedger::complete`] once it has a result.
	Fresh,
	/// This key was already seen. `replay` carries the original response body once the
	/// first caller finished; `None` means the first caller is still in flight, which the
	/// mediator surfaces as [`Error::IdempotencyConflict`].
	Duplicate {
		/// The original caller's stored result, if it has completed.
		replay: Option<Vec<u8>>,
	},
}

#[derive(Clone, Serialize, Deserialize)]
struct Record {
	#[serde(with = "time::serde::rfc3339")]
	first_seen_at: OffsetDateTime,
	#[serde(default)]
	result: Option<Vec<u8>>,
}

/// Dedup ledger for mutating endpoints and background workers, backed by the shared cache.
pub struct IdempotencyLedger {
	cache: Arc<dyn SharedCache>,
}
impl IdempotencyLedger {
	/// Builds a ledger over `cache`. Callers own key namespacing (e.g. prefixing with the
	/// route or queue name) before calling [`Self::admit`].
	pub fn new(cache: Arc<dyn SharedCache>) -> Self {
		Self { cache }
	}

	/// Atomically checks and, if `key` is unseen, records it as in-flight. Returns
	/// [`AdmitOutcome::Fresh`] exactly once per `ttl` window per key.
	pub async fn admit(&self, key: &str, ttl: Duration) -> Result<AdmitOutcome, Error> {
		let placeholder = Record { first_seen_at: OffsetDateTime::now_utc(), result: None };
		let encoded = serde_json::to_vec(&placeholder)
			.map_err(|e| crate::error::CacheError::Serialization { message: e.to_string() })?;

		if self.cache.set_if_absent(key, encoded, ttl).await.map_err(Error::from)? {
			return Ok(AdmitOutcome::Fresh);
		}

		let existing = self.cache.get_json::<Record>(key).await.map_err(Error::from)?;

		Ok(AdmitOutcome::Duplicate { replay: existing.and_then(|record| record.result) })
	}

	/// Attaches `result` to a previously admitted `key`, so later duplicates within `ttl`
	/// replay it instead of conflicting. `ttl` should match (or outlive) the one passed to
	/// [`Self::admit`]; a shorter TTL here would let the record vanish before the window
	/// callers were promised has elapsed.
	pub async fn complete(&self, key: &str, ttl: Duration, result: Vec<u8>) -> Result<(), Error> {
		let record = Record { first_seen_at: OffsetDateTime::now_utc(), result: Some(result) };

		self.cache.set_json(key, &record, ttl).await.map_err(Error::from)
	}

	/// Returns `true` when `key` has an active record, without admitting it. Exposed for
	/// background workers that want a read-only check before doing expensive work.
	pub async fn seen(&self, key: &str) -> Result<bool, Error> {
		Ok(self.cache.get_json::<Record>(key).await.map_err(Error::from)?.is_some())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::cache::InProcessCache;

	fn ledger() -> IdempotencyLedger {
		IdempotencyLedger::new(Arc::new(InProcessCache::new(100)))
	}

	#[tokio::test]
	async fn first_admission_is_fresh() {
		let ledger = ledger();
		let outcome = ledger.admit("key-1", Duration::seconds(60)).await.unwrap();

		assert_eq!(outcome, AdmitOutcome::Fresh);
	}

	#[tokio::test]
	async fn duplicate_before_completion_has_no_replay() {
		let ledger = ledger();

		ledger.admit("key-1", Duration::seconds(60)).await.unwrap();

		let outcome = ledger.admit("key-1", Duration::seconds(60)).await.unwrap();

		assert_eq!(outcome, AdmitOutcome::Duplicate { replay: None });
	}

	#[tokio::test]
	async fn duplicate_after_completion_replays_stored_result() {
		let ledger = ledger();

		ledger.admit("key-1", Duration::seconds(60)).await.unwrap();
		ledger.complete("key-1", Duration::seconds(60), b"result-body".to_vec()).await.unwrap();

		let outcome = ledger.admit("key-1", Duration::seconds(60)).await.unwrap();

		assert_eq!(outcome, AdmitOutcome::Duplicate { replay: Some(b"result-body".to_vec()) });
	}

	#[tokio::test]
	async fn seen_reports_false_for_unknown_key() {
		let ledger = ledger();

		assert!(!ledger.seen("never-used").await.unwrap());
	}

	#[tokio::test]
	async fn distinct_keys_are_independent() {
		let ledger = ledger();

		ledger.admit("key-a", Duration::seconds(60)).await.unwrap();

		let outcome = ledger.admit("key-b", Duration::seconds(60)).await.unwrap();

		assert_eq!(outcome, AdmitOutcome::Fresh);
	}
}
