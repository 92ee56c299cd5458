//! OAuth client facade for the tenant token endpoint.
//!
//! Agave tenants expose a WSO2-style token endpoint at `<baseurl>token`. Refreshes send a
//! form-encoded `grant_type=refresh_token` request with `scope=PRODUCTION` and authenticate the
//! client with HTTP basic auth (`apikey` / `apisecret`).

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
	store::AuthRecord,
};

/// Scope requested on every refresh.
pub const REFRESH_SCOPE: &str = "PRODUCTION";

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Token material returned by a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
	/// New access token.
	pub access_token: String,
	/// Rotated refresh token, when the endpoint issued one.
	pub refresh_token: Option<String>,
	/// Lifetime of the new access token in seconds, exactly as returned.
	pub expires_in: i64,
}
impl Debug for RefreshedTokens {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshedTokens")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

pub(crate) struct RefreshFacade {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestClient,
	endpoint: String,
}
impl RefreshFacade {
	/// Builds the client for the token endpoint named by `record`.
	pub(crate) fn from_record(record: &AuthRecord, http_client: ReqwestClient) -> Result<Self> {
		let endpoint = format!("{}token", record.require("baseurl")?);
		let token_url = TokenUrl::new(endpoint.clone())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: endpoint.clone(), source })?;
		let oauth_client = BasicClient::new(ClientId::new(record.require("apikey")?.to_owned()))
			.set_client_secret(ClientSecret::new(record.require("apisecret")?.to_owned()))
			.set_auth_type(AuthType::BasicAuth)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client, endpoint })
	}

	pub(crate) fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Exchanges `refresh_token` for a new token pair.
	pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens> {
		let secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&secret)
			.add_scope(Scope::new(REFRESH_SCOPE.to_owned()))
			.request_async(&self.http_client)
			.await
			.map_err(map_request_error)?;
		let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
		let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

		Ok(RefreshedTokens {
			access_token: response.access_token().secret().to_owned(),
			refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
			expires_in,
		})
	}
}

fn map_request_error(err: BasicRequestTokenError<HttpClientError<ReqwestError>>) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let reason = match response.error_description() {
				Some(description) => format!("{}: {description}", response.error().as_ref()),
				None => response.error().as_ref().to_owned(),
			};

			Error::InvalidGrant { reason }
		},
		RequestTokenError::Request(error) => map_transport_error(error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::ResponseParse { endpoint: "Token endpoint", source, status: None }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status: None }.into(),
	}
}

fn map_transport_error(err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) =>
			if inner.is_builder() {
				ConfigError::from(*inner).into()
			} else {
				TransportError::from(*inner).into()
			},
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status: None,
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: None,
		}
		.into(),
	}
}
