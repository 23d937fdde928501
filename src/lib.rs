//! Backend-for-frontend core for a secure document access platform — bearer token
//! validation, on-behalf-of token exchange, resilient downstream calls, and
//! resource-based authorization in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod access_source;
pub mod authz;
pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod exchange;
pub mod graph;
pub mod idempotency;
pub mod mediator;
pub mod obs;
pub mod problem;
pub mod ratelimit;
pub mod resilience;

#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		cache::{InProcessCache, SharedCache},
		resilience::ResilienceFabric,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Builds an in-process shared cache suitable for integration tests.
	pub fn test_shared_cache() -> Arc<dyn SharedCache> {
		Arc::new(InProcessCache::new(10_000))
	}

	/// Builds a resilience fabric with short timeouts/backoffs suitable for tests.
	pub fn test_resilience_fabric() -> ResilienceFabric {
		ResilienceFabric::for_tests()
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
