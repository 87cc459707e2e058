//! Ticket acquisition capability.
//!
//! The daemon never talks to a KDC directly. It hands an [`AccountIdentity`] to a
//! [`TicketAcquirer`] and receives ticket cache bytes back. Implementations classify their
//! own failures into [`AcquireErrorKind`] so the provisioner can report them per account
//! without knowing anything about the mechanism.

pub mod kinit;

pub use kinit::KinitAcquirer;

// self
use crate::{_prelude::*, account::AccountIdentity, ticket::TicketMaterial};

/// Boxed future returned by [`TicketAcquirer::acquire`].
pub type AcquireFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TicketMaterial, AcquireError>> + 'a + Send>>;

/// Capability that obtains a Kerberos ticket cache for one account.
///
/// Implementors must be `Send + Sync`; the provisioner shares one instance across every
/// in-flight request. Timeouts are enforced by the caller, so implementations may block for
/// as long as their mechanism needs, but must tolerate being dropped mid-flight.
pub trait TicketAcquirer: Send + Sync {
	/// Acquires ticket cache bytes for `identity`.
	fn acquire<'a>(&'a self, identity: &'a AccountIdentity) -> AcquireFuture<'a>;
}

/// Canonical acquisition failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquireErrorKind {
	/// Directory service does not know the account.
	AccountNotFound,
	/// Directory service refused to issue a ticket.
	AuthDenied,
	/// The mechanism gave up waiting.
	Timeout,
	/// Temporary failure; retrying may succeed.
	Transient,
}
impl AcquireErrorKind {
	/// Returns a stable label suitable for logs and wire messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::AccountNotFound => "account_not_found",
			Self::AuthDenied => "auth_denied",
			Self::Timeout => "timeout",
			Self::Transient => "transient",
		}
	}
}
impl Display for AcquireErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Failure reported by a [`TicketAcquirer`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{kind}: {message}")]
pub struct AcquireError {
	/// Failure category.
	pub kind: AcquireErrorKind,
	/// Mechanism-supplied detail.
	pub message: String,
}
impl AcquireError {
	/// Builds an error of the given kind.
	pub fn new(kind: AcquireErrorKind, message: impl Into<String>) -> Self {
		Self { kind, message: message.into() }
	}

	/// Shorthand for [`AcquireErrorKind::Transient`] failures.
	pub fn transient(message: impl Into<String>) -> Self {
		Self::new(AcquireErrorKind::Transient, message)
	}
}
