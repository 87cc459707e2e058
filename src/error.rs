//! Daemon-level error types shared across the parser, provisioner, registry, and transport.

// std
use std::io::ErrorKind;
// self
use crate::{
	_prelude::*,
	account::IdentifierError,
	credspec::ParseError,
	provision::ProvisionFailures,
	registry::RegistryError,
};

/// Daemon-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
///
/// Every variant is request-scoped; none of them should take the serving process down.
#[derive(Debug, ThisError)]
pub enum Error {
	/// A credential spec could not be parsed or validated.
	#[error(transparent)]
	Parse(#[from] ParseError),
	/// No ticket could be provisioned for any account in the request.
	#[error(transparent)]
	Provision(#[from] ProvisionFailures),
	/// Lease registry rejected the operation.
	#[error(transparent)]
	Registry(#[from] RegistryError),
	/// Ticket file could not be written or removed.
	#[error(transparent)]
	Filesystem(#[from] FilesystemError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure while talking over the local socket.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Caller supplied an identifier that fails validation.
	#[error("Invalid identifier: {0}")]
	InvalidIdentifier(#[from] IdentifierError),
}

/// Filesystem failures surfaced while managing ticket files.
#[derive(Debug, ThisError)]
pub enum FilesystemError {
	/// The daemon lacks permission to touch the path.
	#[error("Permission denied for {}.", path.display())]
	PermissionDenied {
		/// Path that could not be accessed.
		path: PathBuf,
	},
	/// Any other I/O failure.
	#[error("I/O error on {}: {source}.", path.display())]
	Io {
		/// Path that could not be accessed.
		path: PathBuf,
		/// Underlying I/O failure.
		#[source]
		source: std::io::Error,
	},
}
impl FilesystemError {
	/// Classifies an I/O failure for the given path.
	pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		let path = path.into();

		match source.kind() {
			ErrorKind::PermissionDenied => Self::PermissionDenied { path },
			_ => Self::Io { path, source },
		}
	}

	/// Path the failure refers to.
	pub fn path(&self) -> &Path {
		match self {
			Self::PermissionDenied { path } | Self::Io { path, .. } => path,
		}
	}
}

/// Configuration and validation failures raised at startup.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// A path option must be absolute.
	#[error("The {option} path must be absolute: {}.", path.display())]
	RelativePath {
		/// Name of the offending option.
		option: &'static str,
		/// Supplied path.
		path: PathBuf,
	},
	/// A numeric option must be positive.
	#[error("The {option} value must be greater than zero.")]
	ZeroValue {
		/// Name of the offending option.
		option: &'static str,
	},
}

/// Transport-level failures on the local socket.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Socket I/O failed.
	#[error("I/O error occurred on the local socket.")]
	Io(#[from] std::io::Error),
	/// Peer sent a frame that is not valid protocol JSON.
	#[error("Peer sent an undecodable frame.")]
	Codec(#[from] serde_json::Error),
	/// Peer sent a frame larger than the protocol allows.
	#[error("Frame exceeds {limit} bytes.")]
	FrameTooLarge {
		/// Maximum accepted frame length.
		limit: usize,
	},
	/// Peer closed the connection before a response arrived.
	#[error("Peer closed the connection.")]
	Closed,
	/// Peer answered with a response for a different method.
	#[error("Peer answered with an unexpected {kind} response.")]
	UnexpectedResponse {
		/// Response kind that was received.
		kind: &'static str,
	},
}
