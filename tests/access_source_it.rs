// crates.io
use httpmock::prelude::*;
// self
use sdap_bff_core::{
	_preludet::*,
	access_source::{AccessDataSource, DataverseAccessDataSource},
	auth::{AccessLevel, ResourceId, UserId},
};

#[tokio::test]
async fn cached_snapshot_serves_stale_data_until_the_ttl_elapses() {
	let server = MockServer::start_async().await;
	let user = UserId::new("u5").expect("Failed to build mock user identifier.");
	let resource = ResourceId::new("docZ").expect("Failed to build mock resource identifier.");
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/accessgrants");
			then.status(200).header("content-type", "application/json").body(format!(
				r#"{{"user_id":"u5","resource_id":"docZ","access_level":"read","explicit_deny":false,"team_memberships":[],"team_access_level":"none","roles":[],"source_timestamp":"{}"}}"#,
				OffsetDateTime::now_utc()
					.format(&time::format_description::well_known::Rfc3339)
					.expect("Failed to format mock source timestamp."),
			));
		})
		.await;

	let cache = test_shared_cache();
	let ttl = Duration::milliseconds(120);
	let source = DataverseAccessDataSource::new(
		Url::parse(&server.base_url()).expect("Failed to parse mock metadata store base URL."),
		cache,
		ttl,
		Arc::new(test_resilience_fabric()),
	);

	let first = source.get_access(&user, &resource).await.expect("Initial fetch should succeed.");

	assert_eq!(first.access_level, AccessLevel::Read);

	// Permissions change downstream, but within the TTL window the cached snapshot still
	// serves the stale "read" value — correct per the TTL contract, not a bug.
	mock.delete();

	tokio::time::sleep(std::time::Duration::from_millis(30)).await;

	let still_cached = source.get_access(&user, &resource).await.expect("Cached read should not touch the network.");

	assert_eq!(still_cached.access_level, AccessLevel::Read);

	tokio::time::sleep(std::time::Duration::from_millis(150)).await;

	let revoked_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/accessgrants");
			then.status(404);
		})
		.await;
	let after_ttl = source.get_access(&user, &resource).await.expect("Expired cache entry should refetch.");

	assert_eq!(after_ttl.access_level, AccessLevel::None);

	revoked_mock.assert_calls_async(1).await;
}
