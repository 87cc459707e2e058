// std
use std::{
	collections::HashSet,
	path::PathBuf,
	sync::{Arc, Barrier},
	thread,
};
// self
use credentials_fetcher::{
	account::{AccountIdentity, AccountName, Realm},
	registry::{LeaseRegistry, RegistryError},
	ticket::TicketArtifact,
};

const THREADS: usize = 8;
const LEASES_PER_THREAD: usize = 64;

fn artifact(tag: &str) -> TicketArtifact {
	let identity = AccountIdentity::new(
		AccountName::new("WebApp01").expect("Account fixture should be valid."),
		Realm::new("contoso.com").expect("Realm fixture should be valid."),
	);

	TicketArtifact::new(PathBuf::from("/var/credentials-fetcher/krbdir").join(tag), identity)
}

#[test]
fn concurrent_creates_never_share_an_identifier() {
	let registry = Arc::new(LeaseRegistry::new());
	let barrier = Arc::new(Barrier::new(THREADS));
	let handles: Vec<_> = (0..THREADS)
		.map(|worker| {
			let registry = registry.clone();
			let barrier = barrier.clone();

			thread::spawn(move || {
				barrier.wait();

				(0..LEASES_PER_THREAD)
					.map(|n| {
						registry
							.create_lease(vec![artifact(&format!("{worker}-{n}"))])
							.expect("Creating a lease with a unique path should succeed.")
					})
					.collect::<Vec<_>>()
			})
		})
		.collect();
	let mut seen = HashSet::new();

	for handle in handles {
		for lease_id in handle.join().expect("Worker thread should not panic.") {
			assert!(seen.insert(lease_id), "Lease identifiers must be unique.");
		}
	}

	assert_eq!(seen.len(), THREADS * LEASES_PER_THREAD);
	assert_eq!(registry.len(), THREADS * LEASES_PER_THREAD);
}

#[test]
fn racing_delete_claims_admit_exactly_one_winner() {
	let registry = Arc::new(LeaseRegistry::new());
	let lease_id = registry
		.create_lease(vec![artifact("contested")])
		.expect("Creating the contested lease should succeed.");
	let barrier = Arc::new(Barrier::new(THREADS));
	let handles: Vec<_> = (0..THREADS)
		.map(|_| {
			let registry = registry.clone();
			let barrier = barrier.clone();
			let lease_id = lease_id.clone();

			thread::spawn(move || {
				barrier.wait();

				match registry.begin_delete(&lease_id) {
					Ok(claim) => {
						registry.complete_delete(claim);

						Ok(())
					},
					Err(e) => Err(e),
				}
			})
		})
		.collect();
	let outcomes: Vec<_> = handles
		.into_iter()
		.map(|handle| handle.join().expect("Worker thread should not panic."))
		.collect();

	assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
	assert!(outcomes.iter().all(|outcome| matches!(
		outcome,
		Ok(()) | Err(RegistryError::AlreadyDeleting { .. } | RegistryError::NotFound { .. })
	)));
	assert!(registry.is_empty());
}

#[test]
fn deleted_identifiers_stay_retired() {
	let registry = LeaseRegistry::new();
	let first = registry
		.create_lease(vec![artifact("retired")])
		.expect("Creating the first lease should succeed.");
	let claim = registry.begin_delete(&first).expect("Claiming the lease should succeed.");

	registry.complete_delete(claim);

	// Reusing the path is fine once the lease is gone; reusing the identifier is not.
	let second = registry
		.create_lease(vec![artifact("retired")])
		.expect("The freed path should be reusable.");

	assert_ne!(first, second);
	assert!(matches!(registry.lookup(&first), Err(RegistryError::NotFound { .. })));
}
