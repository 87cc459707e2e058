//! Lease orchestration: credential specs in, revocable groups of ticket caches out.
//!
//! [`LeaseManager`] ties the parser, the [`Provisioner`], and the [`LeaseRegistry`] together.
//! Each operation lives in its own module as an `impl` block:
//!
//! - `create`: parse, provision concurrently, then register whatever succeeded.
//! - `delete`: claim, remove every ticket file, then drop the record.
//! - `reconcile`: remove lease directories no live lease owns.

mod create;
mod delete;
mod reconcile;

pub use create::*;
pub use delete::*;

// self
use crate::{
	_prelude::*,
	acquire::KinitAcquirer,
	config::DaemonConfig,
	provision::Provisioner,
	registry::LeaseRegistry,
};

/// Coordinates lease creation and revocation.
///
/// Cloning is cheap; clones share the registry and the acquisition permits.
#[derive(Clone, Debug)]
pub struct LeaseManager {
	registry: Arc<LeaseRegistry>,
	provisioner: Provisioner,
}
impl LeaseManager {
	/// Creates a manager over an existing registry and provisioner.
	pub fn new(registry: Arc<LeaseRegistry>, provisioner: Provisioner) -> Self {
		Self { registry, provisioner }
	}

	/// Builds the production manager: `kinit` acquisition and the optional registry snapshot.
	pub fn from_config(config: &DaemonConfig) -> Result<Self> {
		let registry = match &config.registry_snapshot {
			Some(path) => LeaseRegistry::open(path)?,
			None => LeaseRegistry::new(),
		};
		let mut acquirer = KinitAcquirer::new(&config.kinit_path, config.scratch_dir());

		if let Some(keytab) = &config.keytab {
			acquirer = acquirer.with_keytab(keytab);
		}

		let provisioner = Provisioner::new(&config.krb_dir, Arc::new(acquirer))
			.with_timeout(config.acquire_timeout())
			.with_max_concurrency(config.max_concurrent_acquisitions);

		Ok(Self::new(Arc::new(registry), provisioner))
	}

	/// Registry backing this manager.
	pub fn registry(&self) -> &LeaseRegistry {
		&self.registry
	}

	/// Provisioner writing this manager's ticket caches.
	pub fn provisioner(&self) -> &Provisioner {
		&self.provisioner
	}

	/// Number of live leases, for health reporting.
	pub fn active_leases(&self) -> usize {
		self.registry.len()
	}
}
