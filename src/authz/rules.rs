//! The five rules that make up the mandated production authorization chain.
//!
//! Each rule is a plain value implementing [`AuthorizationRule`] — a flat set of values
//! composed by an ordered `Vec`, not an inheritance hierarchy, per the rule-modeling redesign
//! flag.

// self
use crate::auth::{AccessSnapshot, Operation};

/// Result of a single rule's evaluation against a (snapshot, operation) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
	/// Final: permit the operation. Short-circuits remaining rules.
	Allow(&'static str),
	/// Final: refuse the operation. Short-circuits remaining rules.
	Deny(&'static str),
	/// Abstain; the chain proceeds to the next rule.
	Continue,
}

/// A single authorization rule. Implementations MUST be pure and MUST NOT perform I/O — all
/// the data a rule needs is already present on the [`AccessSnapshot`].
pub trait AuthorizationRule
where
	Self: Send + Sync,
{
	/// Evaluates this rule against `snapshot` for the given `operation`.
	fn evaluate(&self, snapshot: &AccessSnapshot, operation: Operation) -> RuleOutcome;
}

/// Rule 1: an explicit deny blocks every operation regardless of any other grant.
pub struct ExplicitDenyRule;
impl AuthorizationRule for ExplicitDenyRule {
	fn evaluate(&self, snapshot: &AccessSnapshot, _operation: Operation) -> RuleOutcome {
		if snapshot.explicit_deny { RuleOutcome::Deny("ExplicitDeny") } else { RuleOutcome::Continue }
	}
}

/// Rule 2: the `admin` role allows any operation (unless rule 1 already denied).
pub struct AdminRule;
impl AuthorizationRule for AdminRule {
	fn evaluate(&self, snapshot: &AccessSnapshot, _operation: Operation) -> RuleOutcome {
		if snapshot.has_role("admin") { RuleOutcome::Allow("Admin") } else { RuleOutcome::Continue }
	}
}

/// Rule 3: the user's own direct access level meets or exceeds the operation's required
/// level.
pub struct ExplicitGrantRule;
impl AuthorizationRule for ExplicitGrantRule {
	fn evaluate(&self, snapshot: &AccessSnapshot, operation: Operation) -> RuleOutcome {
		if snapshot.meets(operation.required_access_level()) {
			RuleOutcome::Allow("Grant")
		} else {
			RuleOutcome::Continue
		}
	}
}

/// Rule 4: a team the user belongs to has been granted the required level on this resource.
pub struct TeamMembershipRule;
impl AuthorizationRule for TeamMembershipRule {
	fn evaluate(&self, snapshot: &AccessSnapshot, operation: Operation) -> RuleOutcome {
		if snapshot.meets_via_team(operation.required_access_level()) {
			RuleOutcome::Allow("Team")
		} else {
			RuleOutcome::Continue
		}
	}
}

/// Rule 5: the final fallthrough. Always denies; never abstains.
pub struct DefaultDenyRule;
impl AuthorizationRule for DefaultDenyRule {
	fn evaluate(&self, _snapshot: &AccessSnapshot, _operation: Operation) -> RuleOutcome {
		RuleOutcome::Deny("NoAccess")
	}
}
