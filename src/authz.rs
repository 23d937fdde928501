//! Authorization engine: an ordered, fail-closed rule chain evaluating an [`AccessSnapshot`]
//! against an [`Operation`], plus the audit record every evaluation produces.

pub mod rules;

pub use rules::{
	AdminRule, AuthorizationRule, DefaultDenyRule, ExplicitDenyRule, ExplicitGrantRule, RuleOutcome,
	TeamMembershipRule,
};

// std
use std::time::Instant as StdInstant;
// self
use crate::{
	_prelude::*,
	auth::{AccessSnapshot, Operation},
	obs::record_authorization_decision,
};

/// Outcome of evaluating the full rule chain against one (snapshot, operation) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
	/// The operation is permitted.
	Allow,
	/// The operation is denied.
	Deny,
}
impl Decision {
	/// Returns a stable label suitable for span/metric fields and audit records.
	pub const fn as_str(self) -> &'static str {
		match self {
			Decision::Allow => "allow",
			Decision::Deny => "deny",
		}
	}
}

/// Audit record emitted for every authorization decision, whether the chain allowed or denied.
/// Exactly one of these is produced per evaluation, including the fail-closed `RuleError` path.
#[derive(Clone, Debug)]
pub struct AuthorizationAudit {
	/// Outcome of the evaluation.
	pub decision: Decision,
	/// Stable reason tag identifying which rule decided the outcome (e.g. `"ExplicitDeny"`,
	/// `"Admin"`, `"Grant"`, `"Team"`, `"NoAccess"`, `"RuleError"`).
	pub reason: &'static str,
	/// Operation that was evaluated.
	pub operation: Operation,
	/// How long the evaluation took.
	pub duration: Duration,
}

/// Deterministic, order-sensitive rule chain. Each rule returns `Allow`/`Deny` (final,
/// short-circuiting) or `Continue` (abstain, try the next rule). A rule that panics is caught
/// at the chain level and treated as `Deny("RuleError")` — fail-closed is mandatory.
pub struct AuthorizationEngine {
	chain: Vec<Box<dyn AuthorizationRule>>,
}
impl AuthorizationEngine {
	/// Builds an engine from an explicit, caller-supplied rule chain. Production code should
	/// use [`Self::default_chain`]; this constructor exists so tests can exercise
	/// reordered/partial chains without touching the mandated production chain.
	pub fn new(chain: Vec<Box<dyn AuthorizationRule>>) -> Self {
		Self { chain }
	}

	/// The mandated production chain, in the order `spec.md` §4.G requires:
	/// `ExplicitDeny → Admin → ExplicitGrant → TeamMembership → DefaultDeny`. Tie-breaks are
	/// resolved by position: the first rule to return `Allow`/`Deny` wins.
	pub fn default_chain() -> Self {
		Self::new(vec![
			Box::new(ExplicitDenyRule),
			Box::new(AdminRule),
			Box::new(ExplicitGrantRule),
			Box::new(TeamMembershipRule),
			Box::new(DefaultDenyRule),
		])
	}

	/// Evaluates `snapshot` against `operation`, returning the final decision plus an audit
	/// record. A rule that panics is caught and treated as `Deny("RuleError")`.
	pub fn evaluate(&self, snapshot: &AccessSnapshot, operation: Operation) -> AuthorizationAudit {
		let started = StdInstant::now();
		let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.run_chain(snapshot, operation)));
		let (decision, reason) = match outcome {
			Ok(Some((decision, reason))) => (decision, reason),
			Ok(None) => (Decision::Deny, "NoAccess"),
			Err(_) => (Decision::Deny, "RuleError"),
		};
		let duration = Duration::try_from(started.elapsed()).unwrap_or(Duration::ZERO);

		record_authorization_decision(reason, decision == Decision::Allow);

		AuthorizationAudit { decision, reason, operation, duration }
	}

	fn run_chain(&self, snapshot: &AccessSnapshot, operation: Operation) -> Option<(Decision, &'static str)> {
		for rule in &self.chain {
			match rule.evaluate(snapshot, operation) {
				RuleOutcome::Allow(reason) => return Some((Decision::Allow, reason)),
				RuleOutcome::Deny(reason) => return Some((Decision::Deny, reason)),
				RuleOutcome::Continue => continue,
			}
		}

		None
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::{AccessLevel, ResourceId, TeamId, UserId};

	fn snapshot() -> AccessSnapshot {
		AccessSnapshot::no_access(
			UserId::new("u1").unwrap(),
			ResourceId::new("r1").unwrap(),
			OffsetDateTime::now_utc(),
		)
	}

	#[test]
	fn explicit_deny_wins_over_admin_and_grants() {
		let mut snap = snapshot();

		snap.explicit_deny = true;
		snap.roles.insert("admin".to_owned());
		snap.access_level = AccessLevel::Admin;

		let engine = AuthorizationEngine::default_chain();
		let audit = engine.evaluate(&snap, Operation::ManageContainers);

		assert_eq!(audit.decision, Decision::Deny);
		assert_eq!(audit.reason, "ExplicitDeny");
	}

	#[test]
	fn admin_role_allows_any_operation() {
		let mut snap = snapshot();

		snap.roles.insert("admin".to_owned());

		let engine = AuthorizationEngine::default_chain();
		let audit = engine.evaluate(&snap, Operation::ManageContainers);

		assert_eq!(audit.decision, Decision::Allow);
		assert_eq!(audit.reason, "Admin");
	}

	#[test]
	fn explicit_grant_allows_matching_level() {
		let mut snap = snapshot();

		snap.access_level = AccessLevel::Write;

		let engine = AuthorizationEngine::default_chain();
		let audit = engine.evaluate(&snap, Operation::UploadFile);

		assert_eq!(audit.decision, Decision::Allow);
		assert_eq!(audit.reason, "Grant");
	}

	#[test]
	fn team_membership_allows_when_no_direct_grant() {
		let mut snap = snapshot();

		snap.team_memberships.insert(TeamId::new("team-legal").unwrap());
		snap.team_access_level = AccessLevel::Read;

		let engine = AuthorizationEngine::default_chain();
		let audit = engine.evaluate(&snap, Operation::PreviewFile);

		assert_eq!(audit.decision, Decision::Allow);
		assert_eq!(audit.reason, "Team");
	}

	#[test]
	fn no_access_denies_by_default() {
		let snap = snapshot();
		let engine = AuthorizationEngine::default_chain();
		let audit = engine.evaluate(&snap, Operation::PreviewFile);

		assert_eq!(audit.decision, Decision::Deny);
		assert_eq!(audit.reason, "NoAccess");
	}

	#[test]
	fn panicking_rule_fails_closed_as_rule_error() {
		struct Boom;
		impl AuthorizationRule for Boom {
			fn evaluate(&self, _snapshot: &AccessSnapshot, _operation: Operation) -> RuleOutcome {
				panic!("rule exploded");
			}
		}

		let engine = AuthorizationEngine::new(vec![Box::new(Boom)]);
		let audit = engine.evaluate(&snapshot(), Operation::PreviewFile);

		assert_eq!(audit.decision, Decision::Deny);
		assert_eq!(audit.reason, "RuleError");
	}
}
