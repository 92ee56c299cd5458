// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::FetchStage};

/// A span builder used by the fetch stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage + call site.
	pub fn new(stage: FetchStage, call: &'static str) -> Self {
		let span = tracing::info_span!("agave_fetch.stage", stage = stage.as_str(), call);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		tracing::Instrument::instrument(fut, self.span.clone())
	}
}
