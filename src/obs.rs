//! Observability helpers shared by the fetch stages.
//!
//! Every stage runs inside a `tracing` span named `agave_fetch.stage` carrying the `stage` label
//! and the `call` site. Enable the `metrics` feature to increment the `agave_fetch_stage_total`
//! counter for every attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Stages of an Agave fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchStage {
	/// Tenant directory lookup.
	TenantDirectory,
	/// Profile check deciding whether an access token is still accepted.
	TokenValidation,
	/// Refresh-token exchange.
	TokenRefresh,
	/// Byte transfer through the download transport.
	Download,
}
impl FetchStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FetchStage::TenantDirectory => "tenant_directory",
			FetchStage::TokenValidation => "token_validation",
			FetchStage::TokenRefresh => "token_refresh",
			FetchStage::Download => "download",
		}
	}
}
impl Display for FetchStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure, logged and converted to a benign default or propagated.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
