//! Fetch orchestration for Agave tenant URLs.
//!
//! [`AgaveFetcher`] owns the tenant map, the shared reqwest client, and the download transport.
//! A fetch walks `locate credentials → validate token → (refresh)? → download`, logging and
//! absorbing every failure so the caller only ever sees "file retrieved" or "no file".
//!
//! The credential store is re-read on every call and rewritten without locking. Concurrent
//! fetchers sharing one store may lose a refreshed token; callers embedding this in a
//! concurrent host should serialize fetches per store.

pub mod fetch;
pub mod refresh;
pub mod validate;

pub use validate::PROFILE_PATH;

// self
use crate::{
	_prelude::*,
	config::AgaveConfig,
	error::ConfigError,
	tenant::{ReqwestTenantDirectory, TenantDirectory, TenantMap},
	transport::{DownloadTransport, ReqwestDownloader},
};

/// Coordinates tenant detection, token checks, refreshes, and downloads.
#[derive(Clone)]
pub struct AgaveFetcher {
	/// HTTP client shared by the profile check and the token endpoint.
	pub http_client: ReqwestClient,
	/// Transport performing the actual byte transfer.
	pub transport: Arc<dyn DownloadTransport>,
	/// Plugin configuration (credential store path, directory endpoint).
	pub config: AgaveConfig,
	tenants: TenantMap,
}
impl AgaveFetcher {
	/// Builds a fetcher, loading the tenant map once from `directory`.
	pub async fn new(
		directory: &dyn TenantDirectory,
		config: AgaveConfig,
		http_client: ReqwestClient,
		transport: Arc<dyn DownloadTransport>,
	) -> Result<Self> {
		let tenants = directory.fetch_tenants().await?;

		Ok(Self::with_tenants(tenants, config, http_client, transport))
	}

	/// Builds a fetcher over an already known tenant map.
	pub fn with_tenants(
		tenants: TenantMap,
		config: AgaveConfig,
		http_client: ReqwestClient,
		transport: Arc<dyn DownloadTransport>,
	) -> Self {
		Self { http_client, transport, config, tenants }
	}

	/// Builds a fetcher wired to the configured tenant directory and the reqwest downloader.
	pub async fn connect(config: AgaveConfig) -> Result<Self> {
		let http_client = ReqwestClient::builder()
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(ConfigError::from)?;
		let directory = ReqwestTenantDirectory::new(http_client.clone(), config.tenants_url.clone());
		let transport = Arc::new(ReqwestDownloader::new(http_client.clone()));

		Self::new(&directory, config, http_client, transport).await
	}

	/// Tenant map loaded at construction.
	pub fn tenants(&self) -> &TenantMap {
		&self.tenants
	}

	/// Returns the tenant owning `url`, if any.
	pub fn detect_tenant(&self, url: &str) -> Option<&str> {
		self.tenants.detect(url)
	}
}
impl Debug for AgaveFetcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AgaveFetcher")
			.field("config", &self.config)
			.field("tenants", &self.tenants.len())
			.finish()
	}
}
