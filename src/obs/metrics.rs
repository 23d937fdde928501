// self
use crate::obs::{Outcome, StageKind};

/// Records a pipeline stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(stage: StageKind, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"sdap_request_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records an authorization decision via the global metrics recorder (when enabled).
pub fn record_authorization_decision(rule: &'static str, allowed: bool) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"sdap_authorization_total",
			"rule" => rule,
			"decision" => if allowed { "allow" } else { "deny" }
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (rule, allowed);
	}
}

/// Records a circuit breaker state transition via the global metrics recorder.
pub fn record_breaker_transition(host: &str, state: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"sdap_breaker_transition_total",
			"host" => host.to_owned(),
			"state" => state
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (host, state);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_stage_outcome_noop_without_metrics() {
		record_stage_outcome(StageKind::Exchange, Outcome::Failure);
	}

	#[test]
	fn record_authorization_decision_noop_without_metrics() {
		record_authorization_decision("explicit_deny", false);
	}
}
