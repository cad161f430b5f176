// self
use crate::{_prelude::*, obs::ServiceStage};

/// Future returned by [`ServiceSpan::instrument`]; the bare future when tracing is off.
#[cfg(feature = "tracing")]
pub type InstrumentedService<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`ServiceSpan::instrument`]; the bare future when tracing is off.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedService<F> = F;

/// `oidc_rp.service` span covering one pipeline step of one service.
///
/// The `state` and `http.status` fields start empty and are filled once the exchange key or
/// the provider's answer is known.
#[derive(Clone, Debug)]
pub struct ServiceSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl ServiceSpan {
	/// Opens the span for `service` at `stage`.
	pub fn new(service: &'static str, stage: ServiceStage) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oidc_rp.service",
				service,
				stage = stage.as_str(),
				state = tracing::field::Empty,
				http.status = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (service, stage);

			Self {}
		}
	}

	/// Records the exchange key, if the call names one.
	pub fn with_state(self, state: Option<&str>) -> Self {
		#[cfg(feature = "tracing")]
		{
			if let Some(state) = state {
				self.span.record("state", state);
			}
		}
		#[cfg(not(feature = "tracing"))]
		let _ = state;

		self
	}

	/// Records the status code the provider answered with.
	pub fn record_status(&self, status: u16) {
		#[cfg(feature = "tracing")]
		self.span.record("http.status", status);
		#[cfg(not(feature = "tracing"))]
		let _ = status;
	}

	/// Enters the span until the returned guard drops; for the synchronous build and consume
	/// steps.
	pub fn entered(self) -> ServiceSpanGuard {
		#[cfg(feature = "tracing")]
		{
			ServiceSpanGuard { _entered: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			ServiceSpanGuard {}
		}
	}

	/// Attaches the span to the transport future of a round trip.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedService<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Keeps a [`ServiceSpan`] entered.
pub struct ServiceSpanGuard {
	#[cfg(feature = "tracing")]
	_entered: tracing::span::EnteredSpan,
}
impl Debug for ServiceSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ServiceSpanGuard(..)")
	}
}
