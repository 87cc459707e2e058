//! Ticket material and the on-disk artifacts produced from it.

// self
use crate::{_prelude::*, account::AccountIdentity};

/// Redacted wrapper around raw ticket cache bytes keeping credentials out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct TicketMaterial(Vec<u8>);
impl TicketMaterial {
	/// Wraps ticket cache bytes returned by an acquirer.
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(bytes.into())
	}

	/// Returns the raw bytes. Callers must avoid logging them.
	pub fn expose(&self) -> &[u8] {
		&self.0
	}

	/// Number of bytes held.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no bytes were acquired.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl Debug for TicketMaterial {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TicketMaterial").field(&"<redacted>").finish()
	}
}

/// Ticket cache file written for one account on behalf of one lease.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketArtifact {
	/// Absolute path of the ticket cache file.
	pub path: PathBuf,
	/// Account the ticket belongs to.
	pub identity: AccountIdentity,
	/// Instant the file was written.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl TicketArtifact {
	/// Describes a freshly written ticket cache file.
	pub fn new(path: PathBuf, identity: AccountIdentity) -> Self {
		Self { path, identity, created_at: OffsetDateTime::now_utc() }
	}

	/// Path rendered for wire responses.
	pub fn display_path(&self) -> String {
		self.path.display().to_string()
	}
}
