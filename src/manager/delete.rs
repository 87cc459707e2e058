//! Lease revocation: claim the lease, remove every ticket file, then drop the record.

// std
use std::io::ErrorKind;
// self
use crate::{
	_prelude::*,
	account::LeaseId,
	manager::LeaseManager,
	obs::{self, LeaseOp, LeaseOutcome, LeaseSpan},
	provision,
	registry::Lease,
};

/// Result of a completed delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedLease {
	/// Identifier of the removed lease.
	pub lease_id: LeaseId,
	/// Ticket paths the lease held, in creation order.
	pub deleted_paths: Vec<PathBuf>,
}

impl LeaseManager {
	/// Removes every ticket file of `lease_id` and forgets the lease.
	///
	/// Files already gone count as deleted. If a file cannot be removed the error is returned
	/// and the lease stays in the deleting state; calling this again resumes the delete.
	pub async fn delete_lease(&self, lease_id: &LeaseId) -> Result<DeletedLease> {
		const OP: LeaseOp = LeaseOp::Delete;

		let span = LeaseSpan::new(OP, "delete_lease");

		obs::record_lease_outcome(OP, LeaseOutcome::Attempt);

		let result = span
			.instrument(async {
				span.record_lease_id(lease_id);

				let claim = self.registry.begin_delete(lease_id)?;

				for path in claim.lease().paths() {
					provision::remove_ticket(path).await?;
				}

				self.prune_lease_dirs(claim.lease()).await;

				let lease = self.registry.complete_delete(claim);

				tracing::info!(lease_id = %lease.id, deleted = lease.artifacts.len(), "Lease deleted.");

				Ok(DeletedLease {
					lease_id: lease.id,
					deleted_paths: lease.artifacts.into_iter().map(|artifact| artifact.path).collect(),
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_lease_outcome(OP, LeaseOutcome::Success),
			Err(_) => obs::record_lease_outcome(OP, LeaseOutcome::Failure),
		}

		result
	}

	/// Removes the per-account directories and the lease directory once they are empty.
	async fn prune_lease_dirs(&self, lease: &Lease) {
		let lease_dir = self.provisioner.lease_dir(&lease.id);
		let account_dirs = lease.paths().filter_map(Path::parent);

		for dir in account_dirs.chain([lease_dir.as_path()]) {
			match tokio::fs::remove_dir(dir).await {
				Ok(()) => (),
				Err(e) if e.kind() == ErrorKind::NotFound => (),
				Err(e) => tracing::debug!("Keeping directory {}: {e}", dir.display()),
			}
		}
	}
}
