//! Access-token validity check.
//!
//! The tenant gateway answers any authenticated call made with a stale token with a
//! `{"fault": {"message": "Invalid Credentials", ...}}` body, so a cheap profile lookup is enough
//! to tell whether a refresh is needed.

// self
use crate::{
	_prelude::*,
	error::{TransientError, TransportError},
	flows::AgaveFetcher,
	obs::{self, FetchStage, StageOutcome, StageSpan},
};

/// Profile endpoint, relative to the tenant base URL.
pub const PROFILE_PATH: &str = "profiles/v2/me";

const INVALID_CREDENTIALS: &str = "Invalid Credentials";

#[derive(Debug, Deserialize)]
struct ProfileResponse {
	#[serde(default)]
	fault: Option<serde_json::Value>,
}
impl ProfileResponse {
	fn is_invalid_credentials(&self) -> Result<bool> {
		let Some(fault) = self.fault.as_ref().filter(|fault| fault.is_object()) else {
			return Ok(false);
		};

		match fault.get("message") {
			Some(serde_json::Value::String(message)) => Ok(message.contains(INVALID_CREDENTIALS)),
			_ => Err(TransientError::TokenEndpoint {
				message: "Profile check returned a fault without a message".into(),
				status: None,
			}
			.into()),
		}
	}
}

impl AgaveFetcher {
	/// Returns `true` when the tenant rejects `access_token` as invalid credentials.
	///
	/// Transport and parse failures are logged and reported as "not expired" so an ambiguous
	/// check never blocks a download attempt.
	pub async fn is_token_expired(&self, access_token: &str, base_url: &str) -> bool {
		const STAGE: FetchStage = FetchStage::TokenValidation;

		let span = StageSpan::new(STAGE, "is_token_expired");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		match span.instrument(self.check_token(access_token, base_url)).await {
			Ok(expired) => {
				obs::record_stage_outcome(STAGE, StageOutcome::Success);

				expired
			},
			Err(e) => {
				tracing::warn!(
					base_url,
					error = %e,
					"Unable to check whether the Agave token is expired; assuming it is valid."
				);
				obs::record_stage_outcome(STAGE, StageOutcome::Failure);

				false
			},
		}
	}

	async fn check_token(&self, access_token: &str, base_url: &str) -> Result<bool> {
		let url = format!("{base_url}{PROFILE_PATH}");
		let response = self
			.http_client
			.get(&url)
			.bearer_auth(access_token)
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status().as_u16();
		let bytes = response.bytes().await.map_err(TransportError::from)?;
		let mut de = serde_json::Deserializer::from_slice(&bytes);
		let profile: ProfileResponse = serde_path_to_error::deserialize(&mut de).map_err(|source| {
			TransientError::ResponseParse { endpoint: "Profile check", source, status: Some(status) }
		})?;

		profile.is_invalid_credentials()
	}
}
