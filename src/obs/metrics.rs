// self
use crate::{
	obs::{LeaseOp, LeaseOutcome},
	provision::ProvisionErrorKind,
};

/// Records a lease operation outcome via the global metrics recorder (when enabled).
pub fn record_lease_outcome(op: LeaseOp, outcome: LeaseOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"credentials_fetcher_lease_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Counts one account that got no ticket during a create, labeled by failure kind.
pub fn record_provision_failure(kind: ProvisionErrorKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("credentials_fetcher_provision_failures_total", "kind" => kind.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn every_label_records_without_a_recorder() {
		for op in [LeaseOp::Create, LeaseOp::Delete, LeaseOp::Reconcile] {
			for outcome in [LeaseOutcome::Attempt, LeaseOutcome::Success, LeaseOutcome::Failure] {
				record_lease_outcome(op, outcome);
			}
		}

		assert_eq!(LeaseOp::Reconcile.as_str(), "reconcile");
		assert_eq!(LeaseOutcome::Failure.to_string(), "failure");
	}

	#[test]
	fn provision_failures_are_labeled_by_kind() {
		for kind in [
			ProvisionErrorKind::AccountNotFound,
			ProvisionErrorKind::AuthDenied,
			ProvisionErrorKind::Timeout,
			ProvisionErrorKind::Transient,
			ProvisionErrorKind::Filesystem,
		] {
			record_provision_failure(kind);
		}

		assert_eq!(ProvisionErrorKind::Filesystem.as_str(), "filesystem");
	}
}
