//! Optional observability helpers shared across the mediation pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `sdap.request` with `operation` and
//!   `stage` fields.
//! - Enable `metrics` to increment the `sdap_request_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`, plus dedicated counters
//!   for authorization, cache, and rate-limit outcomes.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed while servicing a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
	/// Bearer token validation.
	Validate,
	/// Rate limit admission.
	RateLimit,
	/// Resource-based authorization.
	Authorize,
	/// Downstream token exchange.
	Exchange,
	/// Downstream call through the resilience fabric.
	Downstream,
}
impl StageKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageKind::Validate => "validate",
			StageKind::RateLimit => "rate_limit",
			StageKind::Authorize => "authorize",
			StageKind::Exchange => "exchange",
			StageKind::Downstream => "downstream",
		}
	}
}
impl Display for StageKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a pipeline stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
