//! Remote tenant directory client.
//!
//! The directory answers `GET <tenants_url>` with `{"result": [{"baseUrl", "code"}, ...]}`. The
//! response is fetched once when a fetcher is built; there is no pagination and no retry.

// self
use crate::{
	_prelude::*,
	error::{TransientError, TransportError},
	obs::{self, FetchStage, StageOutcome, StageSpan},
	tenant::TenantMap,
};

/// Default directory endpoint listing every public tenant.
pub const DEFAULT_TENANTS_URL: &str = "https://api.tacc.utexas.edu/tenants";

/// Boxed future returned by [`TenantDirectory`] implementations.
pub type DirectoryFuture<'a> = Pin<Box<dyn Future<Output = Result<TenantMap>> + 'a + Send>>;

/// Source of the base-URL → tenant mapping.
pub trait TenantDirectory
where
	Self: Send + Sync,
{
	/// Fetches the full tenant list.
	fn fetch_tenants(&self) -> DirectoryFuture<'_>;
}

#[derive(Debug, Deserialize)]
struct DirectoryResponse {
	result: Vec<DirectoryEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectoryEntry {
	base_url: String,
	code: String,
}

/// Directory client backed by reqwest.
#[derive(Clone, Debug)]
pub struct ReqwestTenantDirectory {
	http_client: ReqwestClient,
	url: Url,
}
impl ReqwestTenantDirectory {
	/// Creates a client for the provided directory endpoint.
	pub fn new(http_client: ReqwestClient, url: Url) -> Self {
		Self { http_client, url }
	}

	async fn fetch_now(&self) -> Result<TenantMap> {
		let response = self
			.http_client
			.get(self.url.clone())
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();

		if !status.is_success() {
			return Err(TransportError::Status {
				url: self.url.to_string(),
				status: status.as_u16(),
			}
			.into());
		}

		let bytes = response.bytes().await.map_err(TransportError::from)?;

		parse_directory(&bytes, Some(status.as_u16()))
	}
}
impl TenantDirectory for ReqwestTenantDirectory {
	fn fetch_tenants(&self) -> DirectoryFuture<'_> {
		const STAGE: FetchStage = FetchStage::TenantDirectory;

		let span = StageSpan::new(STAGE, "fetch_tenants");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		Box::pin(async move {
			let result = span.instrument(self.fetch_now()).await;

			match &result {
				Ok(tenants) => {
					tracing::debug!(url = %self.url, count = tenants.len(), "Loaded tenant directory.");
					obs::record_stage_outcome(STAGE, StageOutcome::Success);
				},
				Err(e) => {
					tracing::warn!(url = %self.url, error = %e, "Failed to load tenant directory.");
					obs::record_stage_outcome(STAGE, StageOutcome::Failure);
				},
			}

			result
		})
	}
}

/// Directory that always returns the same map; useful offline and in tests.
#[derive(Clone, Debug, Default)]
pub struct StaticTenantDirectory(pub TenantMap);
impl TenantDirectory for StaticTenantDirectory {
	fn fetch_tenants(&self) -> DirectoryFuture<'_> {
		let tenants = self.0.clone();

		Box::pin(async move { Ok(tenants) })
	}
}

fn parse_directory(bytes: &[u8], status: Option<u16>) -> Result<TenantMap> {
	let mut de = serde_json::Deserializer::from_slice(bytes);
	let response: DirectoryResponse = serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::ResponseParse { endpoint: "Tenant directory", source, status }
	})?;

	Ok(TenantMap::new(response.result.into_iter().map(|entry| (entry.base_url, entry.code))))
}
