// self
use crate::obs::ServiceOutcome;

/// Records a service outcome via the global metrics recorder (when enabled).
pub fn record_service_outcome(service: &'static str, outcome: ServiceOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oidc_rp_service_total",
			"service" => service,
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (service, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_service_outcome_noop_without_recorder() {
		record_service_outcome("provider_info_discovery", ServiceOutcome::Failure);
	}
}
