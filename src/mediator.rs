//! Authorization mediator: the HTTP-facing integration of the access data source and the
//! authorization engine. Handler-invocation code calls [`mediate`] before doing any
//! protected work; a route never reaches its handler without a recorded `Allow`.

// self
use crate::{
	_prelude::*,
	access_source::AccessDataSource,
	auth::{Operation, Principal, ResourceId},
	authz::{AuthorizationAudit, AuthorizationEngine, Decision},
	error::Error,
	obs::{Outcome, StageKind, StageSpan, record_stage_outcome},
};

/// Authorizes one request: derives the caller from `principal`, fetches the effective
/// [`AccessSnapshot`](crate::auth::AccessSnapshot) for `resource_id` via `access_source`, and
/// evaluates it against `operation` through `engine`.
///
/// Returns the [`AuthorizationAudit`] on `Allow`. On `Deny`, returns
/// [`Error::Denied`] carrying the rule's reason tag (never secret, safe to put on the wire).
/// On a missing principal, returns an [`Error::Auth`] (401). When the access data source is
/// unavailable, returns [`Error::Unavailable`] (503) — the decision cannot be safely derived,
/// so the fail-closed principle forbids treating this as either Allow or Deny.
pub async fn mediate(
	operation: Operation,
	resource_id: &ResourceId,
	principal: Option<&Principal>,
	access_source: &dyn AccessDataSource,
	engine: &AuthorizationEngine,
) -> Result<AuthorizationAudit, Error> {
	// The span is attached via `instrument` rather than held as an `entered()` guard, since
	// this function awaits `access_source.get_access` — holding a non-`Send` guard across
	// that await would make this future `!Send` and unusable from a multi-threaded handler.
	let span = StageSpan::new(StageKind::Authorize, "");

	span.instrument(mediate_inner(operation, resource_id, principal, access_source, engine)).await
}

async fn mediate_inner(
	operation: Operation,
	resource_id: &ResourceId,
	principal: Option<&Principal>,
	access_source: &dyn AccessDataSource,
	engine: &AuthorizationEngine,
) -> Result<AuthorizationAudit, Error> {
	record_stage_outcome(StageKind::Authorize, Outcome::Attempt);

	let Some(principal) = principal else {
		record_stage_outcome(StageKind::Authorize, Outcome::Failure);

		return Err(crate::error::AuthError::MissingToken.into());
	};

	let snapshot = match access_source.get_access(&principal.user_id, resource_id).await {
		Ok(snapshot) => snapshot,
		Err(err) => {
			record_stage_outcome(StageKind::Authorize, Outcome::Failure);

			return Err(err);
		},
	};

	let audit = engine.evaluate(&snapshot, operation);

	match audit.decision {
		Decision::Allow => {
			record_stage_outcome(StageKind::Authorize, Outcome::Success);

			Ok(audit)
		},
		Decision::Deny => {
			record_stage_outcome(StageKind::Authorize, Outcome::Failure);

			Err(Error::Denied { reason: audit.reason.to_owned() })
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		access_source::StaticAccessDataSource,
		auth::{AccessLevel, AccessSnapshot, ClaimValue, TokenSecret, UserId},
	};

	fn principal(user: &str) -> Principal {
		Principal {
			user_id: UserId::new(user).unwrap(),
			display_name: None,
			assertion: TokenSecret::new("assertion"),
			claims: Arc::new(BTreeMap::<String, ClaimValue>::new()),
		}
	}

	#[tokio::test]
	async fn missing_principal_is_rejected_before_touching_the_data_source() {
		let source = StaticAccessDataSource::new();
		let engine = AuthorizationEngine::default_chain();
		let resource = ResourceId::new("doc-1").unwrap();
		let result = mediate(Operation::PreviewFile, &resource, None, &source, &engine).await;

		assert!(matches!(result, Err(Error::Auth(crate::error::AuthError::MissingToken))));
	}

	#[tokio::test]
	async fn allowed_operation_returns_audit() {
		let source = StaticAccessDataSource::new();
		let user = UserId::new("u1").unwrap();
		let resource = ResourceId::new("doc-1").unwrap();

		source.seed(AccessSnapshot {
			user_id: user.clone(),
			resource_id: resource.clone(),
			access_level: AccessLevel::Read,
			explicit_deny: false,
			team_memberships: BTreeSet::new(),
			team_access_level: AccessLevel::None,
			roles: BTreeSet::new(),
			source_timestamp: OffsetDateTime::now_utc(),
		});

		let engine = AuthorizationEngine::default_chain();
		let p = principal("u1");
		let audit = mediate(Operation::PreviewFile, &resource, Some(&p), &source, &engine).await.unwrap();

		assert_eq!(audit.decision, Decision::Allow);
	}

	#[tokio::test]
	async fn unseeded_resource_denies_with_reason() {
		let source = StaticAccessDataSource::new();
		let resource = ResourceId::new("doc-missing").unwrap();
		let engine = AuthorizationEngine::default_chain();
		let p = principal("u2");
		let result = mediate(Operation::PreviewFile, &resource, Some(&p), &source, &engine).await;

		assert!(matches!(result, Err(Error::Denied { reason }) if reason == "NoAccess"));
	}
}
