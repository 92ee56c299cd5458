//! Download transport contract and the default reqwest-backed implementation.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use reqwest::header::HeaderMap;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	obs::{self, FetchStage, StageOutcome, StageSpan},
};

/// Boxed future returned by [`DownloadTransport::download`].
pub type DownloadFuture<'a> = Pin<Box<dyn Future<Output = Result<PathBuf>> + 'a + Send>>;

/// Everything a transport needs to move one file.
#[derive(Clone)]
pub struct DownloadRequest<'a> {
	/// Remote URL.
	pub url: &'a str,
	/// Destination on disk.
	pub output_path: &'a Path,
	/// Host keychain, passed through untouched.
	pub keychain: Option<&'a serde_json::Value>,
	/// Extra request headers (e.g. `Authorization`).
	pub headers: HeaderMap,
}
impl<'a> DownloadRequest<'a> {
	/// Creates a request without extra headers or keychain.
	pub fn new(url: &'a str, output_path: &'a Path) -> Self {
		Self { url, output_path, keychain: None, headers: HeaderMap::new() }
	}

	/// Attaches the host keychain.
	pub fn with_keychain(mut self, keychain: Option<&'a serde_json::Value>) -> Self {
		self.keychain = keychain;

		self
	}

	/// Replaces the extra headers.
	pub fn with_headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}
}
impl Debug for DownloadRequest<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DownloadRequest")
			.field("url", &self.url)
			.field("output_path", &self.output_path)
			.field("keychain_set", &self.keychain.is_some())
			.field("headers", &self.headers.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Generic byte-transfer transport the Agave flow delegates to.
pub trait DownloadTransport
where
	Self: Send + Sync,
{
	/// Downloads `request.url` to `request.output_path`, returning the written path.
	fn download<'a>(&'a self, request: DownloadRequest<'a>) -> DownloadFuture<'a>;
}

/// Streams a GET response body to disk.
#[derive(Clone, Debug, Default)]
pub struct ReqwestDownloader {
	http_client: ReqwestClient,
}
impl ReqwestDownloader {
	/// Creates a downloader sharing `http_client`.
	pub fn new(http_client: ReqwestClient) -> Self {
		Self { http_client }
	}

	async fn download_now(&self, request: DownloadRequest<'_>) -> Result<PathBuf> {
		let mut response = self
			.http_client
			.get(request.url)
			.headers(request.headers)
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();

		if !status.is_success() {
			return Err(
				TransportError::Status { url: request.url.to_owned(), status: status.as_u16() }
					.into(),
			);
		}

		if let Some(parent) = request.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(TransportError::Io)?;
		}

		let written = match write_body(&mut response, request.output_path).await {
			Ok(written) => written,
			Err(e) => {
				// Leave no truncated file behind.
				let _ = fs::remove_file(request.output_path);

				return Err(e);
			},
		};

		tracing::debug!(
			url = request.url,
			path = %request.output_path.display(),
			bytes = written,
			"Download complete."
		);

		Ok(request.output_path.to_path_buf())
	}
}
impl DownloadTransport for ReqwestDownloader {
	fn download<'a>(&'a self, request: DownloadRequest<'a>) -> DownloadFuture<'a> {
		const STAGE: FetchStage = FetchStage::Download;

		let span = StageSpan::new(STAGE, "reqwest_download");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		Box::pin(async move {
			let result = span.instrument(self.download_now(request)).await;

			match &result {
				Ok(_) => obs::record_stage_outcome(STAGE, StageOutcome::Success),
				Err(_) => obs::record_stage_outcome(STAGE, StageOutcome::Failure),
			}

			result
		})
	}
}

async fn write_body(response: &mut reqwest::Response, path: &Path) -> Result<u64> {
	let mut file = File::create(path).map_err(TransportError::Io)?;
	let mut written = 0_u64;

	while let Some(chunk) = response.chunk().await.map_err(TransportError::from)? {
		file.write_all(&chunk).map_err(TransportError::Io)?;

		written += chunk.len() as u64;
	}

	file.sync_all().map_err(TransportError::Io)?;

	Ok(written)
}
