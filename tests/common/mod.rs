//! Fixtures shared by the integration tests: a scripted acquirer, temporary ticket roots,
//! and credential spec builders.

#![allow(dead_code)]

// std
use std::{
	collections::HashMap,
	env, fs,
	path::{Path, PathBuf},
	process,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use parking_lot::Mutex;
use time::OffsetDateTime;
// self
use credentials_fetcher::{
	account::AccountIdentity,
	acquire::{AcquireError, AcquireErrorKind, AcquireFuture, TicketAcquirer},
	manager::LeaseManager,
	provision::Provisioner,
	registry::LeaseRegistry,
	ticket::TicketMaterial,
};

/// Behavior scripted for one account name.
#[derive(Clone, Debug)]
pub enum Script {
	/// Fail immediately with the given kind.
	Fail(AcquireErrorKind),
	/// Never complete.
	Hang,
	/// Wait for a lease directory to appear under the given ticket root, put a regular file
	/// where the account's ticket directory goes, then succeed.
	BlockTicketDir(PathBuf),
}

/// In-process [`TicketAcquirer`] whose answers are scripted per account name.
///
/// Unscripted accounts succeed with a small fake ticket cache.
#[derive(Debug, Default)]
pub struct ScriptedAcquirer {
	scripts: Mutex<HashMap<String, Script>>,
	delay: Option<StdDuration>,
	calls: AtomicUsize,
}
impl ScriptedAcquirer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail(self, account: &str, kind: AcquireErrorKind) -> Self {
		self.scripts.lock().insert(account.into(), Script::Fail(kind));

		self
	}

	pub fn hang(self, account: &str) -> Self {
		self.scripts.lock().insert(account.into(), Script::Hang);

		self
	}

	pub fn block_ticket_dir(self, account: &str, krb_dir: impl Into<PathBuf>) -> Self {
		self.scripts.lock().insert(account.into(), Script::BlockTicketDir(krb_dir.into()));

		self
	}

	/// Delays every acquisition, widening the window for concurrent requests to overlap.
	pub fn with_delay(mut self, delay: StdDuration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TicketAcquirer for ScriptedAcquirer {
	fn acquire<'a>(&'a self, identity: &'a AccountIdentity) -> AcquireFuture<'a> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			let script = self.scripts.lock().get(identity.account.as_ref()).cloned();

			match script {
				Some(Script::Fail(kind)) =>
					return Err(AcquireError::new(kind, format!("scripted failure for {identity}"))),
				Some(Script::Hang) => std::future::pending().await,
				Some(Script::BlockTicketDir(krb_dir)) => {
					let lease_dir = wait_for_lease_dir(&krb_dir).await;

					fs::write(lease_dir.join(identity.path_component()), b"blocker")
						.expect("Failed to block the ticket directory.");
				},
				None => (),
			}

			Ok(TicketMaterial::new(format!("fake ticket cache for {identity}")))
		})
	}
}

/// Polls until some lease directory exists under `krb_dir`.
async fn wait_for_lease_dir(krb_dir: &Path) -> PathBuf {
	for _ in 0..500 {
		let found = fs::read_dir(krb_dir).ok().and_then(|entries| {
			entries.flatten().map(|entry| entry.path()).find(|path| {
				path.is_dir()
					&& !path.file_name().and_then(|name| name.to_str()).is_some_and(|name| {
						name.starts_with('.')
					})
			})
		});

		if let Some(lease_dir) = found {
			return lease_dir;
		}

		tokio::time::sleep(StdDuration::from_millis(10)).await;
	}

	panic!("No lease directory appeared under {}.", krb_dir.display());
}

/// Temporary ticket root removed on drop.
#[derive(Debug)]
pub struct TempRoot {
	path: PathBuf,
}
impl TempRoot {
	pub fn new(label: &str) -> Self {
		let path = env::temp_dir().join(format!(
			"credentials_fetcher_{label}_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		));

		fs::create_dir_all(&path).expect("Failed to create temporary ticket root.");

		Self { path }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn krb_dir(&self) -> PathBuf {
		self.path.join("krbdir")
	}
}
impl Drop for TempRoot {
	fn drop(&mut self) {
		let _ = fs::remove_dir_all(&self.path);
	}
}

/// Manager over a fresh in-memory registry writing under `root`.
pub fn build_manager(root: &TempRoot, acquirer: Arc<ScriptedAcquirer>) -> LeaseManager {
	let provisioner = Provisioner::new(root.krb_dir(), acquirer)
		.with_timeout(StdDuration::from_secs(5))
		.with_max_concurrency(4);

	LeaseManager::new(Arc::new(LeaseRegistry::new()), provisioner)
}

/// Credential spec naming `accounts` in `contoso.com`.
pub fn credspec(machine: &str, accounts: &[&str]) -> String {
	let accounts = accounts
		.iter()
		.map(|name| format!(r#"{{"Name":"{name}","Scope":"contoso.com"}}"#))
		.collect::<Vec<_>>()
		.join(",");

	format!(
		r#"{{"CmsPlugins":["ActiveDirectory"],
		"DomainJoinConfig":{{"Sid":"S-1-5-21-4217655605-3681839426-3493040985",
		"MachineAccountName":"{machine}","Guid":"af602f85-d754-4eea-9fa8-fd76810485f1",
		"DnsTreeName":"contoso.com","DnsName":"contoso.com","NetBiosName":"contoso"}},
		"ActiveDirectoryConfig":{{"GroupManagedServiceAccounts":[{accounts}]}}}}"#
	)
}

/// Credential spec whose service account list is empty.
pub fn credspec_without_accounts() -> String {
	credspec("WebApp01", &[])
}

/// Every regular file below `dir`, sorted.
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
	let mut files = Vec::new();
	let mut pending = vec![dir.to_path_buf()];

	while let Some(dir) = pending.pop() {
		let Ok(entries) = fs::read_dir(&dir) else {
			continue;
		};

		for entry in entries.flatten() {
			let path = entry.path();

			if path.is_dir() {
				pending.push(path);
			} else {
				files.push(path);
			}
		}
	}

	files.sort();

	files
}
