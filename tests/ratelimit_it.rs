// self
use sdap_bff_core::{
	_preludet::*,
	problem::ProblemResponse,
	ratelimit::{ConcurrencyPolicy, RateLimiter},
};

#[test]
fn sixth_concurrent_upload_is_rate_limited_with_retry_after() {
	let limiter = RateLimiter::new().with_policy("upload-heavy", Box::new(ConcurrencyPolicy::new(5)));
	let user = "u3";
	let permits: Vec<_> =
		(0..5).map(|_| limiter.admit("upload-heavy", user).expect("First five uploads should be admitted.")).collect();

	let err = limiter.admit("upload-heavy", user).expect_err("The sixth concurrent upload must be rejected.");
	let problem = ProblemResponse::from_error(&err, "/drives/d3/items/i3/content", "corr-ratelimit");

	assert_eq!(problem.status, 429);
	assert_eq!(problem.kind_uri, "urn:sdap:err:RateLimited");
	assert!(problem.retry_after.is_some());

	drop(permits);

	assert!(limiter.admit("upload-heavy", user).is_ok(), "Releasing a permit should free a slot.");
}

#[test]
fn unrelated_users_do_not_share_the_same_concurrency_budget() {
	let limiter = RateLimiter::new().with_policy("upload-heavy", Box::new(ConcurrencyPolicy::new(1)));

	let _u3_permit = limiter.admit("upload-heavy", "u3").expect("u3 should get the one available slot.");

	assert!(limiter.admit("upload-heavy", "u4").is_ok(), "A different key must have its own budget.");
}
