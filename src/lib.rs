//! Agave tenant fetch transport: detect tenant URLs, refresh cached OAuth 2.0 sessions, and hand
//! the download to an HTTP transport with a bearer token attached.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod flows;
pub mod oauth;
pub mod obs;
pub mod store;
pub mod tenant;
pub mod transport;
#[cfg(feature = "test")]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		env, fs, process,
		path::{Path, PathBuf},
	};
	// crates.io
	use parking_lot::Mutex;
	// self
	use crate::{
		config::AgaveConfig,
		error::TransportError,
		flows::AgaveFetcher,
		tenant::TenantMap,
		transport::{DownloadFuture, DownloadRequest, DownloadTransport},
	};

	/// Download call captured by [`RecordingTransport`].
	#[derive(Clone, Debug)]
	pub struct RecordedDownload {
		/// URL passed to the transport.
		pub url: String,
		/// Destination path passed to the transport.
		pub output_path: PathBuf,
		/// `Authorization` header value, when one was attached.
		pub authorization: Option<String>,
	}

	/// Download transport that records every call instead of touching the network.
	#[derive(Debug, Default)]
	pub struct RecordingTransport {
		calls: Mutex<Vec<RecordedDownload>>,
		fail: bool,
	}
	impl RecordingTransport {
		/// Builds a transport whose downloads always fail.
		pub fn failing() -> Self {
			Self { calls: Mutex::default(), fail: true }
		}

		/// Returns a snapshot of the recorded calls.
		pub fn calls(&self) -> Vec<RecordedDownload> {
			self.calls.lock().clone()
		}
	}
	impl DownloadTransport for RecordingTransport {
		fn download<'a>(&'a self, request: DownloadRequest<'a>) -> DownloadFuture<'a> {
			Box::pin(async move {
				let authorization = request
					.headers
					.get(reqwest::header::AUTHORIZATION)
					.and_then(|value| value.to_str().ok())
					.map(str::to_owned);

				self.calls.lock().push(RecordedDownload {
					url: request.url.to_owned(),
					output_path: request.output_path.to_path_buf(),
					authorization,
				});

				if self.fail {
					return Err(TransportError::Status { url: request.url.to_owned(), status: 404 }
						.into());
				}

				Ok(request.output_path.to_path_buf())
			})
		}
	}

	/// Creates a fresh, uniquely named directory under the system temp dir.
	pub fn temp_dir(label: &str) -> PathBuf {
		let unique = format!(
			"agave_fetch_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);
		let dir = env::temp_dir().join(unique);

		fs::create_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to create temporary directory {}: {e}", dir.display())
		});

		dir
	}

	/// Writes `contents` to `path`, panicking with context on failure.
	pub fn write_fixture(path: &Path, contents: &str) {
		fs::write(path, contents)
			.unwrap_or_else(|e| panic!("Failed to write fixture {}: {e}", path.display()));
	}

	/// Builds a fetcher over a fixed tenant map, pointing the credential store at `store_path`.
	pub fn build_test_fetcher(
		tenants: TenantMap,
		store_path: &Path,
		transport: Arc<RecordingTransport>,
	) -> AgaveFetcher {
		let config = AgaveConfig::default().with_config_file_path(store_path);

		AgaveFetcher::with_tenants(tenants, config, ReqwestClient::default(), transport)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
