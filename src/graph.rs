//! Graph client factory: produces HTTP clients pre-bound to a delegated or app-only bearer
//! token and wrapped with the resilience fabric, so handlers never see raw secrets.

// self
use crate::{
	_prelude::*,
	auth::{Principal, TokenSecret},
	error::{Error, TransportError},
	exchange::TokenExchanger,
	resilience::ResilienceFabric,
};

const GRAPH_HOST: &str = "graph.microsoft.com";

/// Produces [`GraphClient`] handles bound to a delegated (on-behalf-of) or app-only token.
pub struct GraphClientFactory {
	http_client: ReqwestClient,
	base_url: Url,
	exchanger: Arc<TokenExchanger>,
	fabric: Arc<ResilienceFabric>,
}
impl GraphClientFactory {
	/// Builds a factory pointed at `base_url` (e.g., `https://graph.microsoft.com/v1.0/`).
	pub fn new(base_url: Url, exchanger: Arc<TokenExchanger>, fabric: Arc<ResilienceFabric>) -> Self {
		Self { http_client: ReqwestClient::new(), base_url, exchanger, fabric }
	}

	/// Builds a client carrying a delegated token obtained via the OBO exchange for
	/// `principal`.
	pub async fn delegated_client(
		&self,
		principal: &Principal,
		scopes: &[String],
	) -> Result<GraphClient, Error> {
		let obo = self.exchanger.exchange(principal, scopes).await?;

		Ok(self.client_with_token(obo.access_token))
	}

	/// Builds a client carrying an app-only token (no user context), used for
	/// platform-initiated background calls.
	pub async fn app_only_client(&self, scopes: &[String]) -> Result<GraphClient, Error> {
		let token = self.exchanger.app_only_token(scopes).await?;

		Ok(self.client_with_token(token))
	}

	fn client_with_token(&self, token: TokenSecret) -> GraphClient {
		GraphClient {
			http_client: self.http_client.clone(),
			base_url: self.base_url.clone(),
			token,
			fabric: self.fabric.clone(),
		}
	}
}

/// A bearer-bound HTTP client for Graph calls. The bearer token is injected internally by
/// [`GraphClient::execute`]; callers never have access to it.
pub struct GraphClient {
	http_client: ReqwestClient,
	base_url: Url,
	token: TokenSecret,
	fabric: Arc<ResilienceFabric>,
}
impl GraphClient {
	/// Issues a GET request to `path` (relative to the factory's base URL) through the
	/// resilience fabric, returning the deserialized JSON body.
	pub async fn get_json<T>(&self, path: &str) -> Result<T, Error>
	where
		T: serde::de::DeserializeOwned + Send + 'static,
	{
		let url =
			self.base_url.join(path).map_err(|e| crate::error::ConfigError::InvalidUrl { source: e })?;
		let client = self.http_client.clone();
		let token = self.token.expose().to_owned();

		self.fabric
			.call(GRAPH_HOST, move || {
				let client = client.clone();
				let url = url.clone();
				let token = token.clone();

				Box::pin(async move {
					let response = client
						.get(url)
						.bearer_auth(token)
						.send()
						.await
						.map_err(TransportError::from)?;

					if !response.status().is_success() {
						return Err(TransportError::network(std::io::Error::other(format!(
							"graph responded with status {}",
							response.status()
						)))
						.into());
					}

					response.json::<T>().await.map_err(|e| TransportError::from(e).into())
				})
			})
			.await
	}
}
