//! Wire messages and framing for the local socket.
//!
//! Every message is an 8-byte little-endian length followed by that many bytes of JSON.
//! Requests are tagged by `method`, responses by `kind`:
//!
//! ```text
//! {"method":"AddKerberosLease","credspec_contents":["{...}"]}
//! {"kind":"AddKerberosLease","lease_id":"..","created_kerberos_file_paths":[".."]}
//! ```

// std
use std::{io::ErrorKind, mem::size_of};
// crates.io
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
// self
use crate::{
	_prelude::*,
	error::TransportError,
	manager::{CreatedLease, DeletedLease},
};

/// Largest accepted frame payload, in bytes.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;
/// Status reported by a healthy daemon.
pub const SERVING: &str = "SERVING";

const HEADER_LEN: usize = size_of::<u64>();

/// Requests accepted by the daemon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
	/// Provision tickets for every account in the credential specs under a new lease.
	AddKerberosLease {
		/// Raw credential spec documents.
		credspec_contents: Vec<String>,
	},
	/// Revoke a lease and delete its tickets.
	DeleteKerberosLease {
		/// Lease to revoke.
		lease_id: String,
	},
	/// Report liveness and the number of live leases.
	HealthCheck,
}
impl Request {
	/// Method name as it appears on the wire.
	pub const fn method(&self) -> &'static str {
		match self {
			Self::AddKerberosLease { .. } => "AddKerberosLease",
			Self::DeleteKerberosLease { .. } => "DeleteKerberosLease",
			Self::HealthCheck => "HealthCheck",
		}
	}
}

/// Responses sent by the daemon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
	/// Answer to [`Request::AddKerberosLease`].
	AddKerberosLease(AddKerberosLeaseResponse),
	/// Answer to [`Request::DeleteKerberosLease`].
	DeleteKerberosLease(DeleteKerberosLeaseResponse),
	/// Answer to [`Request::HealthCheck`].
	HealthCheck(HealthCheckResponse),
	/// Any request that failed.
	Error(ErrorResponse),
}
impl Response {
	/// Builds an error response.
	pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
		Self::Error(ErrorResponse { code, message: message.into() })
	}

	/// Response kind as it appears on the wire.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::AddKerberosLease(_) => "AddKerberosLease",
			Self::DeleteKerberosLease(_) => "DeleteKerberosLease",
			Self::HealthCheck(_) => "HealthCheck",
			Self::Error(_) => "Error",
		}
	}
}

/// Lease created for an `AddKerberosLease` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddKerberosLeaseResponse {
	/// Identifier to pass to `DeleteKerberosLease`.
	pub lease_id: String,
	/// Ticket cache paths, in request order.
	pub created_kerberos_file_paths: Vec<String>,
	/// Accounts that got no ticket: provisioning failures, then unusable descriptors.
	#[serde(default)]
	pub failed_accounts: Vec<FailedAccount>,
}
impl From<CreatedLease> for AddKerberosLeaseResponse {
	fn from(created: CreatedLease) -> Self {
		Self {
			lease_id: created.lease_id.to_string(),
			created_kerberos_file_paths: created
				.created
				.iter()
				.map(|artifact| artifact.display_path())
				.collect(),
			failed_accounts: created
				.failures
				.into_iter()
				.map(|failure| FailedAccount {
					account: failure.identity.principal(),
					error: format!("{}: {}", failure.kind, failure.message),
				})
				.chain(created.rejected.into_iter().map(|rejected| FailedAccount {
					account: rejected.account().to_owned(),
					error: format!("{}: {} at {}", rejected.kind, rejected.reason, rejected.path),
				}))
				.collect(),
		}
	}
}

/// One account of an `AddKerberosLease` request that got no ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAccount {
	/// Kerberos principal of the account.
	pub account: String,
	/// Failure category and detail.
	pub error: String,
}

/// Lease revoked by a `DeleteKerberosLease` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteKerberosLeaseResponse {
	/// Identifier of the revoked lease.
	pub lease_id: String,
	/// Ticket cache paths the lease held.
	pub deleted_kerberos_file_paths: Vec<String>,
}
impl From<DeletedLease> for DeleteKerberosLeaseResponse {
	fn from(deleted: DeletedLease) -> Self {
		Self {
			lease_id: deleted.lease_id.to_string(),
			deleted_kerberos_file_paths: deleted
				.deleted_paths
				.iter()
				.map(|path| path.display().to_string())
				.collect(),
		}
	}
}

/// Daemon liveness report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
	/// Always [`SERVING`] while the daemon accepts requests.
	pub status: String,
	/// Number of live leases.
	pub active_leases: usize,
}

/// Failure of any request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Transport-level status.
	pub code: StatusCode,
	/// Human-readable detail.
	pub message: String,
}

/// Transport-level status codes, named after their gRPC counterparts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
	/// The request itself is unusable.
	InvalidArgument,
	/// The lease or account does not exist.
	NotFound,
	/// A conflicting operation is in flight.
	Aborted,
	/// The daemon is not in a state to serve the request.
	FailedPrecondition,
	/// The daemon or the directory service refused access.
	PermissionDenied,
	/// Ticket acquisition timed out.
	DeadlineExceeded,
	/// A dependency is temporarily unavailable; retrying may succeed.
	Unavailable,
	/// Unexpected daemon-side failure.
	Internal,
}
impl StatusCode {
	/// Returns the wire name of the status.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InvalidArgument => "InvalidArgument",
			Self::NotFound => "NotFound",
			Self::Aborted => "Aborted",
			Self::FailedPrecondition => "FailedPrecondition",
			Self::PermissionDenied => "PermissionDenied",
			Self::DeadlineExceeded => "DeadlineExceeded",
			Self::Unavailable => "Unavailable",
			Self::Internal => "Internal",
		}
	}
}
impl Display for StatusCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Serializes `message` and writes it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<(), TransportError>
where
	W: AsyncWrite + Unpin,
	T: Serialize,
{
	let payload = serde_json::to_vec(message)?;

	if payload.len() > MAX_FRAME_LEN {
		return Err(TransportError::FrameTooLarge { limit: MAX_FRAME_LEN });
	}

	writer.write_all(&(payload.len() as u64).to_le_bytes()).await?;
	writer.write_all(&payload).await?;
	writer.flush().await?;

	Ok(())
}

/// Reads one frame and decodes it; `None` when the peer closed the stream between frames.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>, TransportError>
where
	R: AsyncRead + Unpin,
	T: DeserializeOwned,
{
	let mut header = [0; HEADER_LEN];

	match reader.read_exact(&mut header).await {
		Ok(_) => (),
		Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e.into()),
	}

	let len = u64::from_le_bytes(header);

	if len > MAX_FRAME_LEN as u64 {
		return Err(TransportError::FrameTooLarge { limit: MAX_FRAME_LEN });
	}

	let mut payload = vec![0; len as usize];

	match reader.read_exact(&mut payload).await {
		Ok(_) => (),
		Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(TransportError::Closed),
		Err(e) => return Err(e.into()),
	}

	Ok(Some(serde_json::from_slice(&payload)?))
}
