//! JSON snapshot that mirrors the registry so leases survive a daemon restart.
//!
//! The registry serializes its lease map while it holds its own lock and hands the bytes over
//! as a [`StagedSnapshot`]. Writing happens afterwards, behind a separate async lock, and a
//! staged snapshot older than the last one written is dropped, so the file only moves forward.

// std
use std::{
	fs::{self, File},
	io::Write,
};
// crates.io
use async_lock::Mutex as AsyncMutex;
// self
use crate::{
	_prelude::*,
	registry::{Lease, RegistryError},
};

/// Lease map serialized at one registry generation.
#[derive(Clone, Debug)]
pub struct StagedSnapshot {
	generation: u64,
	bytes: Vec<u8>,
}
impl StagedSnapshot {
	/// Serializes `leases`, ordered by identifier, as of `generation`.
	pub fn new<'a>(
		generation: u64,
		leases: impl Iterator<Item = &'a Lease>,
	) -> Result<Self, RegistryError> {
		let mut leases: Vec<_> = leases.collect();

		leases.sort_by(|a, b| a.id.cmp(&b.id));

		let bytes = serde_json::to_vec_pretty(&leases).map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to serialize lease snapshot: {e}"),
		})?;

		Ok(Self { generation, bytes })
	}

	/// Registry generation the snapshot was taken at.
	pub fn generation(&self) -> u64 {
		self.generation
	}
}

/// Persists the lease map to a JSON file.
#[derive(Debug)]
pub struct LeaseSnapshot {
	path: PathBuf,
	/// Generation of the last snapshot that reached the disk.
	written: AsyncMutex<u64>,
}
impl LeaseSnapshot {
	/// Creates a snapshot handle for `path`; nothing is touched until the first write.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into(), written: AsyncMutex::new(0) }
	}

	/// Snapshot file location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Reads every stored lease; a missing or empty file yields none.
	pub fn load(&self) -> Result<Vec<Lease>, RegistryError> {
		if !self.path.exists() {
			return Ok(Vec::new());
		}

		let bytes = fs::read(&self.path).map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to read {}: {e}", self.path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Vec::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to parse {}: {e}", self.path.display()),
		})
	}

	/// Writes `staged` on the blocking pool unless a newer generation already landed.
	pub async fn write(&self, staged: StagedSnapshot) -> Result<(), RegistryError> {
		let mut written = self.written.lock().await;

		if staged.generation <= *written {
			return Ok(());
		}

		let StagedSnapshot { generation, bytes } = staged;
		let path = self.path.clone();

		tokio::task::spawn_blocking(move || replace_file(&path, &bytes)).await.map_err(|e| {
			RegistryError::Snapshot { message: format!("Snapshot writer task failed: {e}") }
		})??;

		*written = generation;

		Ok(())
	}

	/// Blocking counterpart of [`write`](Self::write) for callers outside a Tokio runtime.
	pub fn write_blocking(&self, staged: StagedSnapshot) -> Result<(), RegistryError> {
		let mut written = self.written.lock_blocking();

		if staged.generation <= *written {
			return Ok(());
		}

		replace_file(&self.path, &staged.bytes)?;

		*written = staged.generation;

		Ok(())
	}
}

/// Atomically replaces `path` with `bytes` through a temp file + rename.
fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), RegistryError> {
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to create snapshot directory {}: {e}", parent.display()),
		})?;
	}

	let mut tmp_path = path.to_path_buf();

	tmp_path.set_extension("tmp");

	{
		let mut file = File::create(&tmp_path).map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to create {}: {e}", tmp_path.display()),
		})?;

		file.write_all(bytes).map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to write {}: {e}", tmp_path.display()),
		})?;
		file.sync_all().map_err(|e| RegistryError::Snapshot {
			message: format!("Failed to sync {}: {e}", tmp_path.display()),
		})?;
	}

	fs::rename(&tmp_path, path).map_err(|e| RegistryError::Snapshot {
		message: format!("Failed to replace {}: {e}", path.display()),
	})
}
