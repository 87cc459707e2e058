//! Lease creation: parse every credential spec, provision each account concurrently, and
//! register whatever succeeded under a fresh lease.
//!
//! A document that fails to parse, or names no usable account, aborts before anything touches
//! the disk; a lone unusable descriptor inside an otherwise usable document is only reported.
//! Provisioning failures never short-circuit sibling accounts; the lease keeps the successful
//! tickets and the response lists the failed accounts. When nothing succeeds the reservation
//! is abandoned and the lease directory removed, so the request leaves no file behind.

// crates.io
use tokio::task::JoinHandle;
// self
use crate::{
	_prelude::*,
	account::{AccountIdentity, LeaseId},
	credspec::{self, ParseError, RejectedDescriptor, ResolvedRequest},
	manager::LeaseManager,
	obs::{self, LeaseOp, LeaseOutcome, LeaseSpan},
	provision::{ProvisionError, ProvisionErrorKind, ProvisionFailures},
	ticket::TicketArtifact,
};

type ProvisionHandle = (AccountIdentity, JoinHandle<Result<TicketArtifact, ProvisionError>>);

/// Result of a create request that produced at least one ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedLease {
	/// Identifier of the new lease.
	pub lease_id: LeaseId,
	/// Tickets written, in request order.
	pub created: Vec<TicketArtifact>,
	/// Accounts that could not be provisioned, in request order.
	pub failures: Vec<ProvisionError>,
	/// Descriptors that named no usable account and were never provisioned.
	pub rejected: Vec<RejectedDescriptor>,
}
impl CreatedLease {
	/// Paths of every ticket written for the lease.
	pub fn paths(&self) -> impl Iterator<Item = &Path> {
		self.created.iter().map(|artifact| artifact.path.as_path())
	}
}

impl LeaseManager {
	/// Provisions tickets for every account named by `credspecs` under a new lease.
	///
	/// Identities repeated within the request are provisioned once. Fails with
	/// [`Error::Parse`] when any document is unusable and with [`Error::Provision`] when no
	/// account could be provisioned. Descriptors naming no usable account are listed in
	/// [`CreatedLease::rejected`].
	pub async fn create_lease<S>(&self, credspecs: &[S]) -> Result<CreatedLease>
	where
		S: AsRef<str>,
	{
		const OP: LeaseOp = LeaseOp::Create;

		let span = LeaseSpan::new(OP, "create_lease");

		obs::record_lease_outcome(OP, LeaseOutcome::Attempt);

		let result = span
			.instrument(async {
				let ResolvedRequest { identities, rejected } = unique_identities(credspecs)?;
				let lease_id = self.registry.reserve();

				span.record_lease_id(&lease_id);

				for descriptor in &rejected {
					tracing::warn!(
						lease_id = %lease_id,
						account = descriptor.account(),
						"{descriptor}"
					);
				}

				let (created, failures) = self.provision_all(&lease_id, identities).await;

				for failure in &failures {
					obs::record_provision_failure(failure.kind);
					tracing::warn!(
						lease_id = %lease_id,
						principal = %failure.identity,
						kind = %failure.kind,
						"{}",
						failure.message
					);
				}

				if created.is_empty() {
					self.registry.abandon(&lease_id);
					self.discard_or_warn(&lease_id).await;

					return Err(ProvisionFailures { failures }.into());
				}
				if let Err(e) = self.registry.commit(lease_id.clone(), created.clone()) {
					self.discard_or_warn(&lease_id).await;

					return Err(e.into());
				}

				tracing::info!(
					lease_id = %lease_id,
					created = created.len(),
					failed = failures.len(),
					rejected = rejected.len(),
					"Lease created."
				);

				Ok(CreatedLease { lease_id, created, failures, rejected })
			})
			.await;

		match &result {
			Ok(_) => obs::record_lease_outcome(OP, LeaseOutcome::Success),
			Err(_) => obs::record_lease_outcome(OP, LeaseOutcome::Failure),
		}

		result
	}

	async fn provision_all(
		&self,
		lease_id: &LeaseId,
		identities: Vec<AccountIdentity>,
	) -> (Vec<TicketArtifact>, Vec<ProvisionError>) {
		// Spawned so a dropped request future cannot stop a write halfway.
		let handles: Vec<ProvisionHandle> = identities
			.into_iter()
			.map(|identity| {
				let provisioner = self.provisioner.clone();
				let lease_id = lease_id.clone();
				let task_identity = identity.clone();
				let handle = tokio::spawn(async move {
					provisioner.provision(&lease_id, task_identity).await
				});

				(identity, handle)
			})
			.collect();
		let mut created = Vec::with_capacity(handles.len());
		let mut failures = Vec::new();

		for (identity, handle) in handles {
			match handle.await {
				Ok(Ok(artifact)) => created.push(artifact),
				Ok(Err(e)) => failures.push(e),
				Err(e) => failures.push(ProvisionError::new(
					identity,
					ProvisionErrorKind::Transient,
					format!("provisioning task did not finish: {e}"),
				)),
			}
		}

		(created, failures)
	}

	async fn discard_or_warn(&self, lease_id: &LeaseId) {
		if let Err(e) = self.provisioner.discard(lease_id).await {
			tracing::warn!(lease_id = %lease_id, "Failed to remove abandoned lease directory: {e}");
		}
	}
}

/// Resolves every document, keeping the first occurrence of each identity.
fn unique_identities<S>(credspecs: &[S]) -> Result<ResolvedRequest, ParseError>
where
	S: AsRef<str>,
{
	if credspecs.is_empty() {
		return Err(ParseError::Incomplete {
			index: 0,
			path: "credspec_contents".into(),
			reason: "the request carries no credential specs".into(),
		});
	}

	let mut resolved = credspec::resolve_request(credspecs.iter().map(AsRef::as_ref))?;
	let mut seen = HashSet::new();

	resolved.identities.retain(|identity| seen.insert(identity.clone()));

	Ok(resolved)
}
