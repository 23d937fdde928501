//! Access levels and the effective-permission snapshot the authorization engine evaluates.

// self
use crate::{
	_prelude::*,
	auth::{ResourceId, TeamId, UserId},
};

/// Ordered access level a principal may hold against a resource.
///
/// Variants are declared in ascending order so the derived [`Ord`] implementation lets
/// [`AccessSnapshot::meets`] compare a held level against an operation's required level with
/// a plain `>=`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
	/// No access at all.
	#[default]
	None,
	/// May read content and metadata.
	Read,
	/// May upload new versions.
	Write,
	/// May delete the resource.
	Delete,
	/// May grant or revoke access for other principals.
	Share,
	/// Full administrative control.
	Admin,
}

/// Effective permissions for a single user × resource pair, as fetched from the access data
/// source. Authorization rules evaluate this snapshot; they never call the data source
/// directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessSnapshot {
	/// The user the snapshot describes.
	pub user_id: UserId,
	/// The resource the snapshot describes.
	pub resource_id: ResourceId,
	/// The highest access level granted to the user directly (not through team membership).
	pub access_level: AccessLevel,
	/// When `true`, the user is explicitly denied regardless of any granted level.
	pub explicit_deny: bool,
	/// Teams the user belongs to that carry access to this resource.
	pub team_memberships: BTreeSet<TeamId>,
	/// The highest access level granted to any of `team_memberships` on this resource.
	/// `None` when no team the user belongs to has been granted any access.
	pub team_access_level: AccessLevel,
	/// Platform-wide roles held by the user (e.g., `platform-admin`).
	pub roles: BTreeSet<String>,
	/// When the underlying data was read; used to reason about cache staleness.
	pub source_timestamp: OffsetDateTime,
}
impl AccessSnapshot {
	/// Builds the conservative "no access" snapshot used when the data source has no record
	/// for the user × resource pair. Never upgrades to any form of allow.
	pub fn no_access(user_id: UserId, resource_id: ResourceId, observed_at: OffsetDateTime) -> Self {
		Self {
			user_id,
			resource_id,
			access_level: AccessLevel::None,
			explicit_deny: false,
			team_memberships: BTreeSet::new(),
			team_access_level: AccessLevel::None,
			roles: BTreeSet::new(),
			source_timestamp: observed_at,
		}
	}

	/// Returns `true` when the user's own direct access level meets or exceeds `required`.
	pub fn meets(&self, required: AccessLevel) -> bool {
		self.access_level >= required
	}

	/// Returns `true` when the user belongs to at least one team and that team's granted
	/// level meets or exceeds `required`.
	pub fn meets_via_team(&self, required: AccessLevel) -> bool {
		!self.team_memberships.is_empty() && self.team_access_level >= required
	}

	/// Returns `true` when any configured admin role is present.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.iter().any(|r| r == role)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn snapshot(level: AccessLevel) -> AccessSnapshot {
		AccessSnapshot {
			user_id: UserId::new("user-1").unwrap(),
			resource_id: ResourceId::new("doc-1").unwrap(),
			access_level: level,
			explicit_deny: false,
			team_memberships: BTreeSet::new(),
			team_access_level: AccessLevel::None,
			roles: BTreeSet::new(),
			source_timestamp: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn meets_compares_ordinal_levels() {
		assert!(snapshot(AccessLevel::Write).meets(AccessLevel::Read));
		assert!(!snapshot(AccessLevel::Read).meets(AccessLevel::Write));
	}

	#[test]
	fn meets_via_team_requires_membership_and_level() {
		let mut snap = snapshot(AccessLevel::None);

		assert!(!snap.meets_via_team(AccessLevel::Read));

		snap.team_memberships.insert(TeamId::new("team-1").unwrap());
		snap.team_access_level = AccessLevel::Write;

		assert!(snap.meets_via_team(AccessLevel::Read));
		assert!(!snap.meets_via_team(AccessLevel::Delete));
	}

	#[test]
	fn no_access_snapshot_never_meets_read() {
		let snap = AccessSnapshot::no_access(
			UserId::new("user-1").unwrap(),
			ResourceId::new("doc-1").unwrap(),
			OffsetDateTime::UNIX_EPOCH,
		);

		assert!(!snap.meets(AccessLevel::Read));
		assert!(!snap.explicit_deny);
	}
}
