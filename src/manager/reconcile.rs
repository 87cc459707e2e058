//! Startup sweep of lease directories that no live lease owns.

// std
use std::io::ErrorKind;
// crates.io
use tokio::fs;
// self
use crate::{
	_prelude::*,
	account::LeaseId,
	error::FilesystemError,
	manager::LeaseManager,
	obs::{self, LeaseOp, LeaseOutcome, LeaseSpan},
};

impl LeaseManager {
	/// Removes every lease directory under the ticket root whose name is not a live lease.
	///
	/// Hidden entries (such as the acquirer's scratch directory) and plain files are left
	/// alone. Meant to run before requests are served: a create in flight has no registry
	/// entry yet and its directory would be swept.
	pub async fn reconcile(&self) -> Result<Vec<PathBuf>> {
		const OP: LeaseOp = LeaseOp::Reconcile;

		let span = LeaseSpan::new(OP, "reconcile");

		obs::record_lease_outcome(OP, LeaseOutcome::Attempt);

		let result = span.instrument(self.sweep_orphans()).await;

		match &result {
			Ok(removed) => {
				if !removed.is_empty() {
					tracing::info!(removed = removed.len(), "Removed orphaned lease directories.");
				}

				obs::record_lease_outcome(OP, LeaseOutcome::Success);
			},
			Err(_) => obs::record_lease_outcome(OP, LeaseOutcome::Failure),
		}

		result
	}

	async fn sweep_orphans(&self) -> Result<Vec<PathBuf>> {
		let root = self.provisioner.root();
		let mut entries = match fs::read_dir(root).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(FilesystemError::from_io(root, e).into()),
		};
		let mut removed = Vec::new();

		while let Some(entry) =
			entries.next_entry().await.map_err(|e| FilesystemError::from_io(root, e))?
		{
			let path = entry.path();
			let file_type =
				entry.file_type().await.map_err(|e| FilesystemError::from_io(&path, e))?;

			if !file_type.is_dir() {
				continue;
			}

			let name = entry.file_name();
			let name = name.to_string_lossy();

			if name.starts_with('.') || self.is_live(&name) {
				continue;
			}

			tracing::debug!("Removing orphaned lease directory {}.", path.display());

			fs::remove_dir_all(&path).await.map_err(|e| FilesystemError::from_io(&path, e))?;
			removed.push(path);
		}

		removed.sort();

		Ok(removed)
	}

	fn is_live(&self, name: &str) -> bool {
		LeaseId::new(name).is_ok_and(|lease_id| self.registry.contains(&lease_id))
	}
}
