//! Refresh-token exchange for cached Agave sessions.
//!
//! The exchange never mutates the caller's record: a successful refresh returns a new
//! [`AuthRecord`] which the fetch flow writes back to the credential store.

// self
use crate::{
	_prelude::*,
	flows::AgaveFetcher,
	oauth::RefreshFacade,
	obs::{self, FetchStage, StageOutcome, StageSpan},
	store::AuthRecord,
};

impl AgaveFetcher {
	/// Exchanges the record's refresh token and returns the updated record.
	///
	/// When the endpoint does not rotate the refresh token the current one is kept.
	pub async fn exchange_refresh_token(&self, record: &AuthRecord) -> Result<AuthRecord> {
		let refresh_token = record.require("refresh_token")?;
		let facade = RefreshFacade::from_record(record, self.http_client.clone())?;

		tracing::debug!(endpoint = facade.endpoint(), "Requesting Agave token refresh.");

		let tokens = facade.refresh(refresh_token).await?;
		let rotated = tokens.refresh_token.unwrap_or_else(|| refresh_token.to_owned());

		Ok(record.refreshed(
			tokens.access_token,
			rotated,
			tokens.expires_in,
			OffsetDateTime::now_utc(),
		)?)
	}

	/// Refreshes `record`, returning `None` (after logging) when the exchange fails.
	pub async fn refresh_token(&self, record: &AuthRecord) -> Option<AuthRecord> {
		const STAGE: FetchStage = FetchStage::TokenRefresh;

		let span = StageSpan::new(STAGE, "refresh_token");

		obs::record_stage_outcome(STAGE, StageOutcome::Attempt);

		match span.instrument(self.exchange_refresh_token(record)).await {
			Ok(updated) => {
				tracing::info!(
					client_name = updated.get("client_name"),
					expires_at = updated.get("expires_at"),
					"Refreshed Agave OAuth token."
				);
				obs::record_stage_outcome(STAGE, StageOutcome::Success);

				Some(updated)
			},
			Err(e) => {
				tracing::warn!(
					client_name = record.get("client_name"),
					error = %e,
					"Unable to refresh Agave token."
				);
				obs::record_stage_outcome(STAGE, StageOutcome::Failure);

				None
			},
		}
	}
}
