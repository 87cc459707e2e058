//! Per-account ticket provisioning: acquire, then write the cache to a deterministic path.
//!
//! Tickets live at `<root>/<lease_id>/<account>@<REALM>/krb5cc`. The lease component keeps
//! artifacts of different leases apart, and the identity component keeps artifacts of one
//! lease apart as long as identities are unique within the lease.

// std
use std::{io::ErrorKind, time::Duration as StdDuration};
// crates.io
use async_lock::Semaphore;
use tokio::{fs, io::AsyncWriteExt};
// self
use crate::{
	_prelude::*,
	account::{AccountIdentity, LeaseId},
	acquire::{AcquireError, AcquireErrorKind, TicketAcquirer},
	error::FilesystemError,
	ticket::{TicketArtifact, TicketMaterial},
};

/// File name of every ticket cache.
pub const TICKET_FILE_NAME: &str = "krb5cc";

const STAGING_FILE_NAME: &str = ".krb5cc.tmp";

/// Per-account provisioning failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisionErrorKind {
	/// Directory service does not know the account.
	AccountNotFound,
	/// Directory service refused to issue a ticket.
	AuthDenied,
	/// Acquisition did not finish within the configured timeout.
	Timeout,
	/// Temporary failure; retrying may succeed.
	Transient,
	/// The ticket could not be written to disk.
	Filesystem,
}
impl ProvisionErrorKind {
	/// Returns a stable label suitable for logs and wire messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccountNotFound => "account_not_found",
			Self::AuthDenied => "auth_denied",
			Self::Timeout => "timeout",
			Self::Transient => "transient",
			Self::Filesystem => "filesystem",
		}
	}
}
impl Display for ProvisionErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl From<AcquireErrorKind> for ProvisionErrorKind {
	fn from(kind: AcquireErrorKind) -> Self {
		match kind {
			AcquireErrorKind::AccountNotFound => Self::AccountNotFound,
			AcquireErrorKind::AuthDenied => Self::AuthDenied,
			AcquireErrorKind::Timeout => Self::Timeout,
			AcquireErrorKind::Transient => Self::Transient,
		}
	}
}

/// Provisioning failure attributed to one account.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Provisioning {identity} failed ({kind}): {message}.")]
pub struct ProvisionError {
	/// Account the failure belongs to.
	pub identity: AccountIdentity,
	/// Failure category.
	pub kind: ProvisionErrorKind,
	/// Human-readable detail.
	pub message: String,
}
impl ProvisionError {
	/// Builds an error for `identity`.
	pub fn new(
		identity: AccountIdentity,
		kind: ProvisionErrorKind,
		message: impl Into<String>,
	) -> Self {
		Self { identity, kind, message: message.into() }
	}

	fn from_acquire(identity: AccountIdentity, err: AcquireError) -> Self {
		Self::new(identity, err.kind.into(), err.message)
	}
}

/// Every account of a request failed; carries one entry per account.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("No ticket could be provisioned for any of the {} requested accounts.", failures.len())]
pub struct ProvisionFailures {
	/// Per-account failures in request order.
	pub failures: Vec<ProvisionError>,
}
impl ProvisionFailures {
	/// Returns the shared failure kind when every account failed the same way.
	pub fn common_kind(&self) -> Option<ProvisionErrorKind> {
		let first = self.failures.first()?.kind;

		self.failures.iter().all(|failure| failure.kind == first).then_some(first)
	}
}

/// Writes ticket caches for accounts on behalf of leases.
#[derive(Clone)]
pub struct Provisioner {
	root: PathBuf,
	acquirer: Arc<dyn TicketAcquirer>,
	timeout: StdDuration,
	permits: Arc<Semaphore>,
}
impl Provisioner {
	/// Default acquisition timeout.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
	/// Default number of concurrent acquisitions.
	pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

	/// Creates a provisioner writing under `root`.
	///
	/// `root` must exist (or be creatable) and be writable by the daemon.
	pub fn new(root: impl Into<PathBuf>, acquirer: Arc<dyn TicketAcquirer>) -> Self {
		Self {
			root: root.into(),
			acquirer,
			timeout: Self::DEFAULT_TIMEOUT,
			permits: Arc::new(Semaphore::new(Self::DEFAULT_MAX_CONCURRENCY)),
		}
	}

	/// Overrides the acquisition timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Caps the number of acquisitions running at once.
	pub fn with_max_concurrency(mut self, permits: usize) -> Self {
		self.permits = Arc::new(Semaphore::new(permits.max(1)));

		self
	}

	/// Directory holding every lease directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Directory holding every ticket of `lease_id`.
	pub fn lease_dir(&self, lease_id: &LeaseId) -> PathBuf {
		self.root.join(lease_id.as_ref())
	}

	/// Deterministic ticket cache path for `identity` within `lease_id`.
	pub fn ticket_path(&self, lease_id: &LeaseId, identity: &AccountIdentity) -> PathBuf {
		self.lease_dir(lease_id).join(identity.path_component()).join(TICKET_FILE_NAME)
	}

	/// Acquires a ticket for `identity` and writes it under `lease_id`.
	///
	/// On failure no file is left behind for the identity.
	pub async fn provision(
		&self,
		lease_id: &LeaseId,
		identity: AccountIdentity,
	) -> Result<TicketArtifact, ProvisionError> {
		let material = {
			let _permit = self.permits.acquire().await;

			match tokio::time::timeout(self.timeout, self.acquirer.acquire(&identity)).await {
				Ok(Ok(material)) => material,
				Ok(Err(e)) => return Err(ProvisionError::from_acquire(identity, e)),
				Err(_) =>
					return Err(ProvisionError::new(
						identity,
						ProvisionErrorKind::Timeout,
						format!("no ticket within {}s", self.timeout.as_secs_f32()),
					)),
			}
		};

		if material.is_empty() {
			return Err(ProvisionError::new(
				identity,
				ProvisionErrorKind::Transient,
				"acquirer returned an empty ticket cache",
			));
		}

		let path = self.ticket_path(lease_id, &identity);

		if let Err(e) = write_ticket(&path, &material).await {
			remove_partial(&path).await;

			return Err(ProvisionError::new(identity, ProvisionErrorKind::Filesystem, e.to_string()));
		}

		tracing::debug!(
			lease_id = %lease_id,
			principal = %identity,
			bytes = material.len(),
			"Ticket written."
		);

		Ok(TicketArtifact::new(path, identity))
	}

	/// Removes the whole directory of `lease_id`; an absent directory is not an error.
	pub async fn discard(&self, lease_id: &LeaseId) -> Result<(), FilesystemError> {
		let dir = self.lease_dir(lease_id);

		match fs::remove_dir_all(&dir).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(FilesystemError::from_io(dir, e)),
		}
	}
}
impl Debug for Provisioner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Provisioner")
			.field("root", &self.root)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Deletes one ticket cache file; an absent file counts as deleted.
pub async fn remove_ticket(path: &Path) -> Result<(), FilesystemError> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
		Err(e) => Err(FilesystemError::from_io(path, e)),
	}
}

async fn write_ticket(path: &Path, material: &TicketMaterial) -> Result<(), FilesystemError> {
	let dir = path.parent().unwrap_or(path);
	let staging = dir.join(STAGING_FILE_NAME);

	fs::create_dir_all(dir).await.map_err(|e| FilesystemError::from_io(dir, e))?;

	{
		let mut options = fs::OpenOptions::new();

		options.write(true).create(true).truncate(true);
		#[cfg(unix)]
		options.mode(0o600);

		let mut file =
			options.open(&staging).await.map_err(|e| FilesystemError::from_io(&staging, e))?;

		file.write_all(material.expose())
			.await
			.map_err(|e| FilesystemError::from_io(&staging, e))?;
		file.sync_all().await.map_err(|e| FilesystemError::from_io(&staging, e))?;
	}

	fs::rename(&staging, path).await.map_err(|e| FilesystemError::from_io(path, e))
}

async fn remove_partial(path: &Path) {
	let staging = path.with_file_name(STAGING_FILE_NAME);

	for file in [path, staging.as_path()] {
		match fs::remove_file(file).await {
			Ok(()) => (),
			Err(e) if e.kind() == ErrorKind::NotFound => (),
			Err(e) => tracing::debug!("Leaving partial ticket {}: {e}", file.display()),
		}
	}

	if let Some(dir) = path.parent() {
		match fs::remove_dir(dir).await {
			Ok(()) => (),
			Err(e) if e.kind() == ErrorKind::NotFound => (),
			Err(e) => tracing::debug!("Keeping directory {}: {e}", dir.display()),
		}
	}
}
