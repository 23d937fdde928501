//! The authenticated caller identity extracted from a validated bearer token.

// self
use crate::{_prelude::*, auth::UserId};

/// A claim value extracted from a validated token, retained for downstream use (e.g., the
/// OBO assertion, tenant scoping) without re-parsing the token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
	/// A string-valued claim.
	Text(String),
	/// A boolean-valued claim.
	Bool(bool),
	/// A numeric claim.
	Number(i64),
	/// A multi-valued claim (e.g. `roles`, `groups`), as the token encodes it.
	List(Vec<String>),
}

/// The authenticated caller, built once by the token validator and cloned cheaply
/// (claims are `Arc`-shared) through the rest of the request.
#[derive(Clone, Debug)]
pub struct Principal {
	/// Stable user identifier (subject claim).
	pub user_id: UserId,
	/// Display name, when present in the token.
	pub display_name: Option<String>,
	/// Raw bearer assertion, kept for the downstream token exchange. Never logged.
	pub assertion: crate::auth::TokenSecret,
	/// Additional claims carried for authorization and auditing.
	pub claims: Arc<BTreeMap<String, ClaimValue>>,
}
impl Principal {
	/// Returns the claim value for `name`, if present.
	pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
		self.claims.get(name)
	}

	/// Returns `true` when the `roles` claim (or equivalent) lists `role`, whether the
	/// token encoded it as a single string or a list of strings.
	pub fn has_claim_role(&self, role: &str) -> bool {
		match self.claim("role") {
			Some(ClaimValue::Text(value)) => value == role,
			Some(ClaimValue::List(values)) => values.iter().any(|v| v == role),
			_ => false,
		}
	}
}
impl Display for Principal {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Principal({})", self.user_id)
	}
}
