//! Observability helpers for lease operations.
//!
//! # Feature Flags
//!
//! - Spans named `credentials_fetcher.lease` carry the `op` (create/delete/reconcile) and
//!   `stage` (call site) fields and are always emitted through `tracing`.
//! - Enable `metrics` to increment the `credentials_fetcher_lease_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.
//!   The `credentials_fetcher_provision_failures_total` counter tracks accounts that got no
//!   ticket, labeled by failure `kind`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Lease operations observed by the daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeaseOp {
	/// Ticket provisioning under a new lease.
	Create,
	/// Revocation of an existing lease.
	Delete,
	/// Startup sweep of orphaned ticket directories.
	Reconcile,
}
impl LeaseOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LeaseOp::Create => "create",
			LeaseOp::Delete => "delete",
			LeaseOp::Reconcile => "reconcile",
		}
	}
}
impl Display for LeaseOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeaseOutcome {
	/// Entry to a manager operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl LeaseOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LeaseOutcome::Attempt => "attempt",
			LeaseOutcome::Success => "success",
			LeaseOutcome::Failure => "failure",
		}
	}
}
impl Display for LeaseOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
