// crates.io
use httpmock::prelude::*;
// self
use sdap_bff_core::{
	_preludet::*,
	access_source::StaticAccessDataSource,
	auth::{AccessLevel, AccessSnapshot, ClaimValue, Operation, Principal, ResourceId, TeamId, TokenSecret, UserId},
	authz::{AuthorizationEngine, Decision},
	error::Error,
	exchange::TokenExchanger,
	graph::GraphClientFactory,
	mediator::mediate,
	problem::ProblemResponse,
};

fn principal(user: &str, assertion: &str) -> Principal {
	Principal {
		user_id: UserId::new(user).expect("Failed to build mock user identifier."),
		display_name: None,
		assertion: TokenSecret::new(assertion),
		claims: Arc::new(BTreeMap::<String, ClaimValue>::new()),
	}
}

#[tokio::test]
async fn happy_preview_obtains_delegated_token_and_proxies_file_store_response() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"delegated-token","expires_in":3600,"scope":"Files.Read"}"#,
			);
		})
		.await;
	let content_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/drives/dX/items/iX/content")
				.header("authorization", "Bearer delegated-token");
			then.status(200).header("content-type", "application/json").body(r#"{"bytes":"preview-body"}"#);
		})
		.await;

	let cache = test_shared_cache();
	let exchanger = Arc::new(TokenExchanger::new(
		Url::parse(&server.url("/token")).expect("Failed to parse mock token endpoint URL."),
		"client-1",
		"secret-1",
		cache,
	));
	let fabric = Arc::new(test_resilience_fabric());
	let factory = GraphClientFactory::new(
		Url::parse(&server.base_url()).expect("Failed to parse mock file store base URL."),
		exchanger,
		fabric,
	);

	let source = StaticAccessDataSource::new();
	let user = UserId::new("u1").expect("Failed to build mock user identifier.");
	let resource = ResourceId::new("docX").expect("Failed to build mock resource identifier.");

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
	let p = principal("u1", "user-assertion-1");
	let audit = mediate(Operation::PreviewFile, &resource, Some(&p), &source, &engine)
		.await
		.expect("Preview should be allowed for a user holding read access.");

	assert_eq!(audit.decision, Decision::Allow);
	assert_eq!(audit.reason, "Grant");

	let client = factory
		.delegated_client(&p, &["Files.Read".to_owned()])
		.await
		.expect("Delegated client should be built once the OBO exchange succeeds.");
	let body: serde_json::Value = client
		.get_json("drives/dX/items/iX/content")
		.await
		.expect("Content GET should succeed through the resilience fabric.");

	assert_eq!(body["bytes"], "preview-body");

	token_mock.assert_calls_async(1).await;
	content_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn explicit_deny_wins_over_team_grant_without_any_token_exchange() {
	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500);
		})
		.await;

	let source = StaticAccessDataSource::new();
	let user = UserId::new("u2").expect("Failed to build mock user identifier.");
	let resource = ResourceId::new("docY").expect("Failed to build mock resource identifier.");
	let team = TeamId::new("t1").expect("Failed to build mock team identifier.");

	source.seed(AccessSnapshot {
		user_id: user.clone(),
		resource_id: resource.clone(),
		access_level: AccessLevel::Write,
		explicit_deny: true,
		team_memberships: BTreeSet::from([team]),
		team_access_level: AccessLevel::Write,
		roles: BTreeSet::new(),
		source_timestamp: OffsetDateTime::now_utc(),
	});

	let engine = AuthorizationEngine::default_chain();
	let p = principal("u2", "user-assertion-2");
	let err = mediate(Operation::UploadFile, &resource, Some(&p), &source, &engine)
		.await
		.expect_err("Explicit deny must win even though the team grants write.");

	match &err {
		Error::Denied { reason } => assert_eq!(reason, "ExplicitDeny"),
		other => panic!("Unexpected error variant: {other:?}."),
	}

	let problem = ProblemResponse::from_error(&err, "/drives/dY/items/iY/content", "corr-deny");

	assert_eq!(problem.status, 403);
	assert_eq!(problem.kind_uri, "urn:sdap:err:Deny");

	// mediate() never reaches the token exchanger on a Deny decision.
	token_mock.assert_calls_async(0).await;
}
