//! Authoritative lease registry: lease id -> artifacts, plus the delete state machine.
//!
//! All state sits behind one [`Mutex`]; the lock is only ever held for map updates and for
//! serializing the optional snapshot, never across ticket acquisition or any file I/O.
//! Snapshot writes land afterwards, in generation order, and are best effort: a failed write
//! is logged and the next mutation or [`LeaseRegistry::flush`] supersedes it.

pub mod snapshot;

pub use snapshot::{LeaseSnapshot, StagedSnapshot};

// self
use crate::{_prelude::*, account::LeaseId, ticket::TicketArtifact};

/// Lifecycle status of a lease.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
	/// Lease and all of its ticket files are live.
	Active,
	/// A delete started; some ticket files may already be gone.
	Deleting,
	/// Every ticket file is gone and the record was dropped.
	Deleted,
}

/// Revocable group of ticket artifacts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
	/// Server-generated identifier.
	pub id: LeaseId,
	/// Ticket artifacts in request order; immutable once committed.
	pub artifacts: Vec<TicketArtifact>,
	/// Instant the lease was committed.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Current lifecycle status.
	pub status: LeaseStatus,
}
impl Lease {
	/// Paths of every ticket file in the lease.
	pub fn paths(&self) -> impl Iterator<Item = &Path> {
		self.artifacts.iter().map(|artifact| artifact.path.as_path())
	}
}

/// Errors raised by [`LeaseRegistry`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RegistryError {
	/// No live lease has this identifier.
	#[error("Lease {lease_id} was not found.")]
	NotFound {
		/// Requested identifier.
		lease_id: LeaseId,
	},
	/// Another delete of the same lease is in flight.
	#[error("Lease {lease_id} is already being deleted.")]
	AlreadyDeleting {
		/// Requested identifier.
		lease_id: LeaseId,
	},
	/// Commit of an identifier that is not an outstanding reservation.
	#[error("Lease {lease_id} is not an outstanding reservation.")]
	UnknownReservation {
		/// Requested identifier.
		lease_id: LeaseId,
	},
	/// A ticket path is already owned by a live lease.
	#[error("Ticket path {} already belongs to a lease.", path.display())]
	PathConflict {
		/// Conflicting path.
		path: PathBuf,
	},
	/// Snapshot could not be read or written.
	#[error("Lease snapshot failure: {message}.")]
	Snapshot {
		/// Human-readable error payload.
		message: String,
	},
}

#[derive(Debug)]
struct Entry {
	lease: Lease,
	claimed: bool,
}

#[derive(Debug)]
struct RegistryState {
	next_sequence: u64,
	generation: u64,
	reserved: HashSet<LeaseId>,
	owned_paths: HashSet<PathBuf>,
	leases: HashMap<LeaseId, Entry>,
}
impl RegistryState {
	fn starting_at(next_sequence: u64) -> Self {
		Self {
			next_sequence,
			generation: 0,
			reserved: HashSet::new(),
			owned_paths: HashSet::new(),
			leases: HashMap::new(),
		}
	}

	fn insert(&mut self, lease: Lease) {
		self.owned_paths.extend(lease.artifacts.iter().map(|artifact| artifact.path.clone()));
		self.leases.insert(lease.id.clone(), Entry { lease, claimed: false });
	}

	fn remove(&mut self, lease_id: &LeaseId) -> Option<Lease> {
		let entry = self.leases.remove(lease_id)?;

		for path in entry.lease.paths() {
			self.owned_paths.remove(path);
		}

		Some(entry.lease)
	}

	fn stage(&mut self) -> Result<StagedSnapshot, RegistryError> {
		self.generation += 1;

		StagedSnapshot::new(self.generation, self.leases.values().map(|entry| &entry.lease))
	}
}

/// Thread-safe lease registry, optionally mirrored to a JSON snapshot.
///
/// Identifiers are minted from a sequence seeded with the wall clock in milliseconds (or just
/// past the highest restored identifier) plus a random suffix, so no set of past identifiers
/// has to be kept to avoid handing one out twice.
#[derive(Debug)]
pub struct LeaseRegistry {
	state: Mutex<RegistryState>,
	snapshot: Option<Arc<LeaseSnapshot>>,
}
impl LeaseRegistry {
	/// Creates an empty, purely in-memory registry.
	pub fn new() -> Self {
		Self { state: Mutex::new(RegistryState::starting_at(clock_sequence())), snapshot: None }
	}

	/// Opens a registry mirrored to `path`, restoring any leases stored there.
	///
	/// Leases saved mid-delete come back as [`LeaseStatus::Deleting`] without an in-flight
	/// claim, so the next delete of them resumes.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
		let snapshot = LeaseSnapshot::new(path);
		let leases = snapshot.load()?;
		let floor = leases
			.iter()
			.filter_map(|lease| lease.id.sequence())
			.max()
			.map_or(0, |sequence| sequence.saturating_add(1));
		let mut state = RegistryState::starting_at(clock_sequence().max(floor));

		for lease in leases {
			state.insert(lease);
		}

		Ok(Self { state: Mutex::new(state), snapshot: Some(Arc::new(snapshot)) })
	}

	/// Mints a fresh identifier and holds it for [`commit`].
	///
	/// [`commit`]: Self::commit
	pub fn reserve(&self) -> LeaseId {
		let mut state = self.state.lock();

		loop {
			let candidate = LeaseId::mint(state.next_sequence);

			state.next_sequence = state.next_sequence.wrapping_add(1);

			if !state.leases.contains_key(&candidate) && state.reserved.insert(candidate.clone())
			{
				return candidate;
			}
		}
	}

	/// Stores `artifacts` under a reserved identifier as an [`LeaseStatus::Active`] lease.
	///
	/// The reservation is consumed even on failure; the identifier is never handed out again.
	pub fn commit(
		&self,
		lease_id: LeaseId,
		artifacts: Vec<TicketArtifact>,
	) -> Result<Lease, RegistryError> {
		let mut state = self.state.lock();

		if !state.reserved.remove(&lease_id) {
			return Err(RegistryError::UnknownReservation { lease_id });
		}

		{
			let mut seen = HashSet::new();

			for artifact in &artifacts {
				if !seen.insert(artifact.path.as_path())
					|| state.owned_paths.contains(&artifact.path)
				{
					return Err(RegistryError::PathConflict { path: artifact.path.clone() });
				}
			}
		}

		let lease = Lease {
			id: lease_id,
			artifacts,
			created_at: OffsetDateTime::now_utc(),
			status: LeaseStatus::Active,
		};

		state.insert(lease.clone());

		let staged = self.stage(&mut state);

		drop(state);
		self.persist(staged);

		Ok(lease)
	}

	/// Reserves and commits in one step, returning the new identifier.
	pub fn create_lease(&self, artifacts: Vec<TicketArtifact>) -> Result<LeaseId, RegistryError> {
		let lease_id = self.reserve();

		self.commit(lease_id, artifacts).map(|lease| lease.id)
	}

	/// Drops a reservation that will never be committed.
	pub fn abandon(&self, lease_id: &LeaseId) {
		self.state.lock().reserved.remove(lease_id);
	}

	/// Returns a copy of the live lease with this identifier.
	pub fn lookup(&self, lease_id: &LeaseId) -> Result<Lease, RegistryError> {
		self.state
			.lock()
			.leases
			.get(lease_id)
			.map(|entry| entry.lease.clone())
			.ok_or_else(|| RegistryError::NotFound { lease_id: lease_id.clone() })
	}

	/// Returns `true` when a live (active or deleting) lease has this identifier.
	pub fn contains(&self, lease_id: &LeaseId) -> bool {
		self.state.lock().leases.contains_key(lease_id)
	}

	/// Claims the lease for deletion, moving it to [`LeaseStatus::Deleting`].
	///
	/// A lease left in `Deleting` by an earlier failed delete can be claimed again. A lease
	/// with a claim still in flight yields [`RegistryError::AlreadyDeleting`].
	pub fn begin_delete(&self, lease_id: &LeaseId) -> Result<DeleteClaim<'_>, RegistryError> {
		let mut state = self.state.lock();
		let entry = state
			.leases
			.get_mut(lease_id)
			.ok_or_else(|| RegistryError::NotFound { lease_id: lease_id.clone() })?;

		if entry.claimed {
			return Err(RegistryError::AlreadyDeleting { lease_id: lease_id.clone() });
		}

		let transitioned = entry.lease.status == LeaseStatus::Active;

		entry.claimed = true;
		entry.lease.status = LeaseStatus::Deleting;

		let lease = entry.lease.clone();
		let staged = if transitioned { self.stage(&mut state) } else { None };

		drop(state);
		self.persist(staged);

		Ok(DeleteClaim { registry: self, lease, completed: false })
	}

	/// Drops the lease record once every ticket file of the claim is gone.
	pub fn complete_delete(&self, mut claim: DeleteClaim<'_>) -> Lease {
		let mut state = self.state.lock();

		state.remove(&claim.lease.id);

		let staged = self.stage(&mut state);

		drop(state);
		self.persist(staged);

		claim.completed = true;

		let mut lease = claim.lease.clone();

		lease.status = LeaseStatus::Deleted;

		lease
	}

	/// Snapshot of every live lease, ordered by creation time.
	pub fn leases(&self) -> Vec<Lease> {
		let mut leases: Vec<_> =
			self.state.lock().leases.values().map(|entry| entry.lease.clone()).collect();

		leases.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

		leases
	}

	/// Number of live leases.
	pub fn len(&self) -> usize {
		self.state.lock().leases.len()
	}

	/// Returns `true` when no lease is live.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Writes the current lease map to the snapshot and waits for it to reach the disk.
	///
	/// Background writes of older generations still queued behind it are dropped.
	pub async fn flush(&self) -> Result<(), RegistryError> {
		let Some(snapshot) = &self.snapshot else {
			return Ok(());
		};
		let staged = self.state.lock().stage()?;

		snapshot.write(staged).await
	}

	fn release(&self, lease_id: &LeaseId) {
		if let Some(entry) = self.state.lock().leases.get_mut(lease_id) {
			entry.claimed = false;
		}
	}

	fn stage(&self, state: &mut RegistryState) -> Option<StagedSnapshot> {
		self.snapshot.as_ref()?;

		state.stage().inspect_err(|e| tracing::warn!("Lease snapshot is stale: {e}")).ok()
	}

	fn persist(&self, staged: Option<StagedSnapshot>) {
		let (Some(snapshot), Some(staged)) = (&self.snapshot, staged) else {
			return;
		};

		match tokio::runtime::Handle::try_current() {
			Ok(runtime) => {
				let snapshot = snapshot.clone();

				runtime.spawn(async move {
					if let Err(e) = snapshot.write(staged).await {
						tracing::warn!("Lease snapshot is stale: {e}");
					}
				});
			},
			Err(_) =>
				if let Err(e) = snapshot.write_blocking(staged) {
					tracing::warn!("Lease snapshot is stale: {e}");
				},
		}
	}
}
impl Default for LeaseRegistry {
	fn default() -> Self {
		Self::new()
	}
}

/// First sequence number for a registry started now.
fn clock_sequence() -> u64 {
	u64::try_from(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
}

/// Exclusive right to delete one lease's ticket files.
///
/// Dropping the claim without passing it to [`LeaseRegistry::complete_delete`] leaves the
/// lease in [`LeaseStatus::Deleting`] and lets a later delete resume it.
#[derive(Debug)]
pub struct DeleteClaim<'a> {
	registry: &'a LeaseRegistry,
	lease: Lease,
	completed: bool,
}
impl DeleteClaim<'_> {
	/// Lease being deleted, as of the claim.
	pub fn lease(&self) -> &Lease {
		&self.lease
	}
}
impl Drop for DeleteClaim<'_> {
	fn drop(&mut self) {
		if !self.completed {
			self.registry.release(&self.lease.id);
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::account::{AccountIdentity, AccountName, Realm};

	fn artifact(lease_id: &LeaseId, account: &str) -> TicketArtifact {
		let identity = AccountIdentity::new(
			AccountName::new(account).expect("Account fixture should be valid."),
			Realm::new("contoso.com").expect("Realm fixture should be valid."),
		);
		let path = PathBuf::from("/var/credentials-fetcher/krbdir")
			.join(lease_id.as_ref())
			.join(identity.path_component())
			.join("krb5cc");

		TicketArtifact::new(path, identity)
	}

	#[test]
	fn reserved_ids_are_unique_and_hidden_until_commit() {
		let registry = LeaseRegistry::new();
		let ids: HashSet<_> = (0..256).map(|_| registry.reserve()).collect();

		assert_eq!(ids.len(), 256);

		let id = ids.into_iter().next().expect("At least one reservation should exist.");

		assert!(matches!(registry.lookup(&id), Err(RegistryError::NotFound { .. })));

		let lease = registry
			.commit(id.clone(), vec![artifact(&id, "WebApp01")])
			.expect("Committing a reservation should succeed.");

		assert_eq!(lease.status, LeaseStatus::Active);
		assert_eq!(registry.lookup(&id), Ok(lease));
		assert!(matches!(
			registry.commit(id.clone(), Vec::new()),
			Err(RegistryError::UnknownReservation { .. })
		));
	}

	#[test]
	fn minted_sequences_increase_and_start_at_the_clock() {
		let before = clock_sequence();
		let registry = LeaseRegistry::new();
		let sequences: Vec<_> = (0..64)
			.map(|_| registry.reserve().sequence().expect("Minted ids should carry a sequence."))
			.collect();

		assert!(sequences[0] >= before);
		assert!(sequences.windows(2).all(|pair| pair[0] < pair[1]));
	}

	#[test]
	fn abandoned_reservations_cannot_be_committed() {
		let registry = LeaseRegistry::new();
		let id = registry.reserve();

		registry.abandon(&id);

		assert!(matches!(
			registry.commit(id, Vec::new()),
			Err(RegistryError::UnknownReservation { .. })
		));
		assert!(registry.is_empty());
	}

	#[test]
	fn ticket_paths_are_never_shared() {
		let registry = LeaseRegistry::new();
		let first = registry.reserve();
		let shared = artifact(&first, "WebApp01");

		registry.commit(first, vec![shared.clone()]).expect("First commit should succeed.");

		let second = registry.reserve();

		assert_eq!(
			registry.commit(second, vec![shared.clone()]),
			Err(RegistryError::PathConflict { path: shared.path.clone() })
		);

		let third = registry.reserve();

		assert!(matches!(
			registry.commit(third.clone(), vec![artifact(&third, "a"), artifact(&third, "a")]),
			Err(RegistryError::PathConflict { .. })
		));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn delete_claims_are_exclusive_until_released() {
		let registry = LeaseRegistry::new();
		let id = registry.reserve();

		registry.commit(id.clone(), vec![artifact(&id, "WebApp01")]).expect("Commit should succeed.");

		let claim = registry.begin_delete(&id).expect("First claim should succeed.");

		assert_eq!(claim.lease().status, LeaseStatus::Deleting);
		assert!(matches!(registry.begin_delete(&id), Err(RegistryError::AlreadyDeleting { .. })));

		drop(claim);

		let lease = registry.lookup(&id).expect("Released lease should remain registered.");

		assert_eq!(lease.status, LeaseStatus::Deleting);

		let claim = registry.begin_delete(&id).expect("Released claim should be resumable.");
		let deleted = registry.complete_delete(claim);

		assert_eq!(deleted.status, LeaseStatus::Deleted);
		assert!(matches!(registry.lookup(&id), Err(RegistryError::NotFound { .. })));
		assert!(matches!(registry.begin_delete(&id), Err(RegistryError::NotFound { .. })));
	}

	#[test]
	fn create_lease_commits_immediately() {
		let registry = LeaseRegistry::new();
		let placeholder = LeaseId::new("placeholder").expect("Lease fixture should be valid.");
		let id = registry
			.create_lease(vec![artifact(&placeholder, "WebApp03")])
			.expect("Creating a lease should succeed.");

		assert_eq!(registry.leases().len(), 1);
		assert_eq!(registry.leases()[0].id, id);
	}
}
