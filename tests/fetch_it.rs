#![cfg(feature = "test")]

// std
use std::{
	fs,
	io::{Read, Write},
	net::TcpListener,
	path::{Path, PathBuf},
	thread,
};
// crates.io
use color_eyre::{Result, eyre::OptionExt};
use httpmock::prelude::*;
// self
use agave_fetch::{
	_preludet::{Arc, RecordingTransport, build_test_fetcher, temp_dir, write_fixture},
	flows::{AgaveFetcher, PROFILE_PATH},
	reqwest::{
		Client as ReqwestClient,
		header::{AUTHORIZATION, HeaderMap, HeaderValue},
	},
	store::{self, AuthRecord, CURRENT_POINTER_FILE},
	tenant::TenantMap,
	transport::{DownloadRequest, DownloadTransport, ReqwestDownloader},
};

const FILE_URL: &str = concat!(
	"https://agave.designsafe-ci.org/files/v2/media/system/",
	"designsafe.storage.published//PRJ-0000/test_file.pdf"
);

fn tenants() -> TenantMap {
	TenantMap::new([("https://agave.designsafe-ci.org/", "designsafe")])
}

fn session(base_url: &str, client_name: &str, access_token: &str) -> serde_json::Value {
	serde_json::json!({
		"refresh_token": format!("{client_name}_REFRESH_TOKEN"),
		"expires_in": 3600,
		"expires_at": "Mon Nov 18 16:12:12 2019",
		"created_at": 1574089932,
		"username": "username",
		"token_username": null,
		"client_name": client_name,
		"use_nonce": false,
		"verify": true,
		"proxies": {},
		"tenantid": "designsafe",
		"apisecret": "API_SECRET",
		"apikey": "API_KEY",
		"baseurl": base_url,
		"access_token": access_token
	})
}

struct Fixture {
	dir: PathBuf,
	store_path: PathBuf,
	output_path: PathBuf,
	transport: Arc<RecordingTransport>,
	fetcher: AgaveFetcher,
}
impl Fixture {
	fn new(label: &str, transport: RecordingTransport) -> Self {
		let dir = temp_dir(label);
		let store_path = dir.join("config.json");
		let output_path = dir.join("test_file.pdf");
		let transport = Arc::new(transport);
		let fetcher = build_test_fetcher(tenants(), &store_path, transport.clone());

		Self { dir, store_path, output_path, transport, fetcher }
	}

	/// Seeds `sessions.designsafe.username` with `(client_name, access_token)` pairs.
	fn seed(&self, base_url: &str, clients: &[(&str, &str)]) {
		let clients: serde_json::Map<_, _> = clients
			.iter()
			.map(|(client, token)| ((*client).to_owned(), session(base_url, client, token)))
			.collect();
		let store = serde_json::json!({
			"sessions": {"designsafe": {"username": clients}},
			"current_tenant": "designsafe"
		});

		write_fixture(&self.store_path, &store.to_string());
	}

	fn stored_record(&self, client_name: &str) -> Result<AuthRecord> {
		let store = store::load_store(&self.store_path)?;

		store
			.tenant("designsafe")?
			.get("username", client_name)
			.cloned()
			.ok_or_eyre("Session should exist.")
	}

	async fn fetch(&self) -> Option<PathBuf> {
		self.fetcher.fetch_file(FILE_URL, &self.output_path, None).await
	}
}

async fn mock_profile<'a>(
	server: &'a MockServer,
	token: &str,
	expired: bool,
) -> httpmock::Mock<'a> {
	let body = if expired {
		serde_json::json!({"fault": {"code": 900901, "message": "Invalid Credentials"}})
	} else {
		serde_json::json!({"status": "success", "result": {"username": "username"}})
	};
	let status = if expired { 401 } else { 200 };
	let bearer = format!("Bearer {token}");

	server
		.mock_async(|when, then| {
			when.method(GET).path(format!("/{PROFILE_PATH}")).header("authorization", bearer);
			then.status(status).header("content-type", "application/json").json_body(body);
		})
		.await
}

fn base_url(server: &MockServer) -> String {
	format!("{}/", server.base_url())
}

fn assert_single_download(fixture: &Fixture, token: &str) {
	let calls = fixture.transport.calls();

	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].url, FILE_URL);
	assert_eq!(calls[0].output_path, fixture.output_path);
	assert_eq!(calls[0].authorization, Some(format!("Bearer {token}")));
}

#[tokio::test]
async fn valid_token_downloads_without_refresh() -> Result<()> {
	let server = MockServer::start_async().await;
	let profile = mock_profile(&server, "VALID_ACCESS_TOKEN", false).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500);
		})
		.await;
	let fixture = Fixture::new("fetch_valid", RecordingTransport::default());

	fixture.seed(&base_url(&server), &[("bdbag_test", "VALID_ACCESS_TOKEN")]);

	let before = fs::read(&fixture.store_path)?;

	assert_eq!(fixture.fetch().await.as_deref(), Some(fixture.output_path.as_path()));

	profile.assert_async().await;
	refresh.assert_calls_async(0).await;

	assert_single_download(&fixture, "VALID_ACCESS_TOKEN");
	assert_eq!(fs::read(&fixture.store_path)?, before);

	Ok(())
}

#[tokio::test]
async fn expired_token_is_refreshed_persisted_and_used() -> Result<()> {
	let server = MockServer::start_async().await;
	let profile = mock_profile(&server, "EXPIRED_ACCESS_TOKEN", true).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("refresh_token=bdbag_test_REFRESH_TOKEN");
			then.status(200).header("content-type", "application/json").json_body(
				serde_json::json!({
					"access_token": "NEW_ACCESS_TOKEN",
					"refresh_token": "NEW_REFRESH_TOKEN",
					"token_type": "bearer",
					"expires_in": 14400
				}),
			);
		})
		.await;
	let fixture = Fixture::new("fetch_expired", RecordingTransport::default());
	let pointer_path = fixture.dir.join(CURRENT_POINTER_FILE);

	fixture.seed(&base_url(&server), &[("bdbag_test", "EXPIRED_ACCESS_TOKEN")]);
	write_fixture(&pointer_path, r#"{"client_name": "bdbag_test"}"#);

	assert_eq!(fixture.fetch().await.as_deref(), Some(fixture.output_path.as_path()));

	profile.assert_async().await;
	refresh.assert_async().await;

	assert_single_download(&fixture, "NEW_ACCESS_TOKEN");

	let stored = fixture.stored_record("bdbag_test")?;

	assert_eq!(stored.get("access_token"), Some("NEW_ACCESS_TOKEN"));
	assert_eq!(stored.get("refresh_token"), Some("NEW_REFRESH_TOKEN"));
	assert_eq!(stored.value("token_username"), Some(&serde_json::Value::Null));
	assert_eq!(
		store::load_store(&fixture.store_path)?.extra.get("current_tenant"),
		Some(&serde_json::json!("designsafe"))
	);

	let pointer: AuthRecord = serde_json::from_slice(&fs::read(&pointer_path)?)?;

	assert_eq!(pointer, stored);

	Ok(())
}

#[tokio::test]
async fn failed_refresh_moves_on_to_the_next_session() -> Result<()> {
	let server = MockServer::start_async().await;
	let expired = mock_profile(&server, "EXPIRED_ACCESS_TOKEN", true).await;
	let valid = mock_profile(&server, "SECOND_ACCESS_TOKEN", false).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({"error": "invalid_grant"}));
		})
		.await;
	let fixture = Fixture::new("fetch_next_session", RecordingTransport::default());

	// Sessions are visited in client-name order: `a_first` before `b_second`.
	fixture.seed(
		&base_url(&server),
		&[("a_first", "EXPIRED_ACCESS_TOKEN"), ("b_second", "SECOND_ACCESS_TOKEN")],
	);

	assert_eq!(fixture.fetch().await.as_deref(), Some(fixture.output_path.as_path()));

	expired.assert_async().await;
	refresh.assert_calls_async(1).await;
	valid.assert_async().await;

	assert_single_download(&fixture, "SECOND_ACCESS_TOKEN");
	assert_eq!(fixture.stored_record("a_first")?.get("access_token"), Some("EXPIRED_ACCESS_TOKEN"));

	Ok(())
}

#[tokio::test]
async fn failed_refresh_on_the_only_session_skips_download() -> Result<()> {
	let server = MockServer::start_async().await;
	let profile = mock_profile(&server, "EXPIRED_ACCESS_TOKEN", true).await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({"error": "invalid_grant"}));
		})
		.await;
	let fixture = Fixture::new("fetch_refresh_fails", RecordingTransport::default());

	fixture.seed(&base_url(&server), &[("bdbag_test", "EXPIRED_ACCESS_TOKEN")]);

	assert!(fixture.fetch().await.is_none());

	profile.assert_async().await;
	refresh.assert_async().await;

	assert!(fixture.transport.calls().is_empty());
	assert_eq!(
		fixture.stored_record("bdbag_test")?.get("access_token"),
		Some("EXPIRED_ACCESS_TOKEN")
	);

	Ok(())
}

#[tokio::test]
async fn first_download_attempt_is_final() -> Result<()> {
	let server = MockServer::start_async().await;
	let first = mock_profile(&server, "FIRST_ACCESS_TOKEN", false).await;
	let second = mock_profile(&server, "SECOND_ACCESS_TOKEN", false).await;
	let fixture = Fixture::new("fetch_download_fails", RecordingTransport::failing());

	fixture.seed(
		&base_url(&server),
		&[("a_first", "FIRST_ACCESS_TOKEN"), ("b_second", "SECOND_ACCESS_TOKEN")],
	);

	assert!(fixture.fetch().await.is_none());

	first.assert_async().await;
	second.assert_calls_async(0).await;

	assert_single_download(&fixture, "FIRST_ACCESS_TOKEN");

	Ok(())
}

#[tokio::test]
async fn token_unfit_for_a_header_aborts_the_fetch() -> Result<()> {
	let server = MockServer::start_async().await;
	let second = mock_profile(&server, "SECOND_ACCESS_TOKEN", false).await;
	let fixture = Fixture::new("fetch_bad_header", RecordingTransport::default());

	fixture.seed(
		&base_url(&server),
		&[("a_first", "BAD\nTOKEN"), ("b_second", "SECOND_ACCESS_TOKEN")],
	);

	assert!(fixture.fetch().await.is_none());

	second.assert_calls_async(0).await;

	assert!(fixture.transport.calls().is_empty());

	Ok(())
}

#[tokio::test]
async fn missing_or_incomplete_store_yields_nothing() {
	let fixture = Fixture::new("fetch_missing_store", RecordingTransport::default());

	assert!(fixture.fetch().await.is_none());

	write_fixture(&fixture.store_path, r#"{"sessions": {"sd2e": {}}}"#);

	assert!(fixture.fetch().await.is_none());

	write_fixture(&fixture.store_path, "{not json");

	assert!(fixture.fetch().await.is_none());
	assert!(fixture.transport.calls().is_empty());
}

#[tokio::test]
async fn non_tenant_urls_download_without_credentials() {
	let fixture = Fixture::new("fetch_plain", RecordingTransport::default());
	let url = "https://example.com/path/to/file.txt";
	let result = fixture.fetcher.fetch_file(url, &fixture.output_path, None).await;

	assert_eq!(result.as_deref(), Some(fixture.output_path.as_path()));

	let calls = fixture.transport.calls();

	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].url, url);
	assert_eq!(calls[0].authorization, None);
}

#[tokio::test]
async fn unsupported_schemes_are_rejected() {
	let fixture = Fixture::new("fetch_scheme", RecordingTransport::default());

	for url in ["ftp://agave.designsafe-ci.org/file", "not a url"] {
		assert!(fixture.fetcher.fetch_file(url, &fixture.output_path, None).await.is_none());
	}

	assert!(fixture.transport.calls().is_empty());
}

#[tokio::test]
async fn reqwest_downloader_writes_response_body() -> Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/files/report.pdf").header("authorization", "Bearer TOKEN");
			then.status(200).body("%PDF-1.4 fixture");
		})
		.await;
	let dir = temp_dir("reqwest_download");
	let output_path = dir.join("nested").join("report.pdf");
	let url = server.url("/files/report.pdf");
	let downloader = ReqwestDownloader::new(ReqwestClient::default());
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer TOKEN"));

	let written =
		downloader.download(DownloadRequest::new(&url, &output_path).with_headers(headers)).await?;

	mock.assert_async().await;

	assert_eq!(written, output_path);
	assert_eq!(fs::read_to_string(&output_path)?, "%PDF-1.4 fixture");

	Ok(())
}

#[tokio::test]
async fn reqwest_downloader_reports_http_errors() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/missing");
			then.status(404);
		})
		.await;
	let dir = temp_dir("reqwest_download_404");
	let output_path: &Path = &dir.join("missing.bin");
	let url = server.url("/missing");
	let downloader = ReqwestDownloader::new(ReqwestClient::default());

	assert!(downloader.download(DownloadRequest::new(&url, output_path)).await.is_err());

	mock.assert_async().await;

	assert!(!output_path.exists());
}

#[tokio::test]
async fn reqwest_downloader_removes_truncated_files() -> Result<()> {
	let listener = TcpListener::bind("127.0.0.1:0")?;
	let url = format!("http://{}/truncated.bin", listener.local_addr()?);
	// Promises 1024 bytes, sends 7, then hangs up.
	let server = thread::spawn(move || -> std::io::Result<()> {
		let (mut stream, _) = listener.accept()?;
		let mut request = Vec::new();
		let mut buf = [0_u8; 1024];

		while !request.windows(4).any(|window| window == b"\r\n\r\n") {
			let read = stream.read(&mut buf)?;

			if read == 0 {
				break;
			}

			request.extend_from_slice(&buf[..read]);
		}

		stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1024\r\n\r\npartial")?;
		stream.flush()
	});
	let dir = temp_dir("reqwest_download_truncated");
	let output_path = dir.join("truncated.bin");
	let downloader = ReqwestDownloader::new(ReqwestClient::default());
	let result = downloader.download(DownloadRequest::new(&url, &output_path)).await;

	server.join().map_err(|_| color_eyre::eyre::eyre!("Server thread panicked."))??;

	assert!(result.is_err());
	assert!(!output_path.exists(), "A truncated download must not be left on disk.");

	Ok(())
}
