//! Client side of the daemon socket.

// crates.io
use tokio::net::UnixStream;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	rpc::{
		AddKerberosLeaseResponse, DeleteKerberosLeaseResponse, HealthCheckResponse, Request,
		Response, StatusCode, protocol,
	},
};

/// Failure of a typed client call.
#[derive(Debug, ThisError)]
pub enum CallError {
	/// The request never got an answer.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The daemon answered with an error.
	#[error("Daemon answered {code}: {message}")]
	Status {
		/// Status reported by the daemon.
		code: StatusCode,
		/// Human-readable detail.
		message: String,
	},
}
impl CallError {
	/// Status reported by the daemon, if it answered.
	pub fn code(&self) -> Option<StatusCode> {
		match self {
			Self::Status { code, .. } => Some(*code),
			Self::Transport(_) => None,
		}
	}
}

/// Connection to a running daemon; calls on one client are sequential.
#[derive(Debug)]
pub struct RpcClient {
	stream: UnixStream,
}
impl RpcClient {
	/// Connects to the daemon listening on `socket_path`.
	pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, TransportError> {
		Ok(Self { stream: UnixStream::connect(socket_path).await? })
	}

	/// Sends one request and waits for its response.
	pub async fn call(&mut self, request: &Request) -> Result<Response, TransportError> {
		protocol::write_frame(&mut self.stream, request).await?;

		protocol::read_frame(&mut self.stream).await?.ok_or(TransportError::Closed)
	}

	/// Requests a lease covering every account named by `credspecs`.
	pub async fn add_kerberos_lease(
		&mut self,
		credspecs: Vec<String>,
	) -> Result<AddKerberosLeaseResponse, CallError> {
		match self.call(&Request::AddKerberosLease { credspec_contents: credspecs }).await? {
			Response::AddKerberosLease(response) => Ok(response),
			other => Err(unexpected(other)),
		}
	}

	/// Revokes `lease_id` and deletes its tickets.
	pub async fn delete_kerberos_lease(
		&mut self,
		lease_id: impl Into<String>,
	) -> Result<DeleteKerberosLeaseResponse, CallError> {
		match self.call(&Request::DeleteKerberosLease { lease_id: lease_id.into() }).await? {
			Response::DeleteKerberosLease(response) => Ok(response),
			other => Err(unexpected(other)),
		}
	}

	/// Asks the daemon whether it is serving.
	pub async fn health_check(&mut self) -> Result<HealthCheckResponse, CallError> {
		match self.call(&Request::HealthCheck).await? {
			Response::HealthCheck(response) => Ok(response),
			other => Err(unexpected(other)),
		}
	}
}

fn unexpected(response: Response) -> CallError {
	match response {
		Response::Error(error) => CallError::Status { code: error.code, message: error.message },
		other => TransportError::UnexpectedResponse { kind: other.kind() }.into(),
	}
}
