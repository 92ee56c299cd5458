//! Credential lookup, refresh, persistence, and download for tenant URLs.

// std
use std::path::{Path, PathBuf};
// crates.io
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::AgaveFetcher,
	obs::{FetchStage, StageSpan},
	store::{self, AuthRecord, CredentialStore},
	transport::DownloadRequest,
};

impl AgaveFetcher {
	/// Downloads `url` for `tenant` using the first usable cached session.
	///
	/// Sessions are tried in username then client-name order. A session whose token is expired
	/// and cannot be refreshed is skipped; the first session that reaches the download stage
	/// decides the outcome, whether the download succeeds or not. Missing store files, malformed
	/// stores, missing keys, and an access token that is not a valid header value abort the call
	/// with `None`.
	pub async fn get_file(
		&self,
		url: &str,
		output_path: &Path,
		keychain: Option<&serde_json::Value>,
		tenant: &str,
	) -> Option<PathBuf> {
		match self.try_get_file(url, output_path, keychain, tenant).await {
			Ok(result) => result,
			Err(e) => {
				tracing::warn!(%tenant, error = %e, "Agave fetch aborted.");

				None
			},
		}
	}

	/// Routes an http(s) URL: tenant URLs go through [`AgaveFetcher::get_file`], anything else
	/// straight to the download transport without extra headers.
	pub async fn fetch_file(
		&self,
		url: &str,
		output_path: &Path,
		keychain: Option<&serde_json::Value>,
	) -> Option<PathBuf> {
		let scheme = match Url::parse(url) {
			Ok(parsed) => parsed.scheme().to_owned(),
			Err(e) => {
				tracing::warn!(url, error = %e, "Unable to parse fetch URL.");

				return None;
			},
		};

		if scheme != "http" && scheme != "https" {
			tracing::warn!(%scheme, "Transfer protocol is not supported by this transport.");

			return None;
		}
		if let Some(tenant) = self.detect_tenant(url) {
			return self.get_file(url, output_path, keychain, tenant).await;
		}

		let request = DownloadRequest::new(url, output_path).with_keychain(keychain);

		self.download(request).await
	}

	async fn try_get_file(
		&self,
		url: &str,
		output_path: &Path,
		keychain: Option<&serde_json::Value>,
		tenant: &str,
	) -> Result<Option<PathBuf>> {
		let store_path = self.config.store_path()?;
		let mut credentials = store::load_store(&store_path)?;
		let sessions: Vec<(String, String, AuthRecord)> = credentials
			.tenant(tenant)?
			.clients()
			.map(|(username, client, record)| (username.to_owned(), client.to_owned(), record.clone()))
			.collect();

		for (username, client_name, record) in sessions {
			let expired = self
				.is_token_expired(record.require("access_token")?, record.require("baseurl")?)
				.await;
			let record = if expired {
				tracing::info!(%username, %client_name, "Agave OAuth token expired; refreshing.");

				let Some(refreshed) = self.refresh_token(&record).await else {
					continue;
				};

				credentials.upsert(tenant, &username, &client_name, refreshed.clone());
				persist(&credentials, &store_path, &refreshed);

				refreshed
			} else {
				record
			};
			let headers = bearer_headers(record.require("access_token")?)?;
			let request = DownloadRequest::new(url, output_path)
				.with_keychain(keychain)
				.with_headers(headers);

			return Ok(self.download(request).await);
		}

		tracing::warn!(%tenant, "No usable Agave session found.");

		Ok(None)
	}

	async fn download(&self, request: DownloadRequest<'_>) -> Option<PathBuf> {
		let span = StageSpan::new(FetchStage::Download, "download");
		let url = request.url;

		match span.instrument(self.transport.download(request)).await {
			Ok(path) => Some(path),
			Err(e) => {
				tracing::warn!(url, error = %e, "Download failed.");

				None
			},
		}
	}
}

fn persist(credentials: &CredentialStore, store_path: &Path, record: &AuthRecord) {
	if let Err(e) = store::save_store(credentials, store_path) {
		tracing::warn!(error = %e, "Unable to write the refreshed Agave credential store.");
	}

	store::update_current_pointer(record, &store::current_pointer_path(store_path));
}

fn bearer_headers(access_token: &str) -> Result<HeaderMap> {
	let mut value = HeaderValue::from_str(&format!("Bearer {access_token}"))
		.map_err(|e| ConfigError::InvalidHeader { source: e })?;
	let mut headers = HeaderMap::new();

	value.set_sensitive(true);
	headers.insert(AUTHORIZATION, value);

	Ok(headers)
}
