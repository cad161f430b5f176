//! Optional observability helpers for the service pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oidc_rp.service` with the `service` (name)
//!   and `stage` (pipeline step) fields.
//! - Enable `metrics` to increment the `oidc_rp_service_total` counter for every
//!   attempt/success/failure, labeled by `service` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline steps surfaced in spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceStage {
	/// `build_request`.
	BuildRequest,
	/// `consume_response`.
	ConsumeResponse,
	/// Full round trip driven by [`crate::client::Client`].
	Request,
}
impl ServiceStage {
	/// Returns a stable label suitable for span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ServiceStage::BuildRequest => "build_request",
			ServiceStage::ConsumeResponse => "consume_response",
			ServiceStage::Request => "request",
		}
	}
}
impl Display for ServiceStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceOutcome {
	/// Entry to a pipeline step.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl ServiceOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ServiceOutcome::Attempt => "attempt",
			ServiceOutcome::Success => "success",
			ServiceOutcome::Failure => "failure",
		}
	}

	/// Maps a pipeline result to its outcome label.
	pub fn of<T>(result: &Result<T>) -> Self {
		if result.is_ok() { ServiceOutcome::Success } else { ServiceOutcome::Failure }
	}
}
impl Display for ServiceOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
