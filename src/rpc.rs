//! Local RPC surface: `AddKerberosLease`, `DeleteKerberosLease`, and `HealthCheck` over a Unix
//! domain socket.
//!
//! The adapter holds no lease state of its own. [`dispatch`] turns a decoded [`Request`] into
//! a [`LeaseManager`] call and folds the outcome into a [`Response`], mapping every error to a
//! [`StatusCode`].

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{CallError, RpcClient};
pub use protocol::*;
pub use server::RpcServer;

// self
use crate::{
	_prelude::*,
	account::LeaseId,
	error::FilesystemError,
	manager::LeaseManager,
	provision::ProvisionErrorKind,
	registry::RegistryError,
};

impl StatusCode {
	/// Maps a daemon error onto the status reported to the caller.
	pub fn of(err: &Error) -> Self {
		match err {
			Error::Parse(_) | Error::InvalidIdentifier(_) => Self::InvalidArgument,
			Error::Provision(failures) => match failures.common_kind() {
				Some(ProvisionErrorKind::AccountNotFound) => Self::NotFound,
				Some(ProvisionErrorKind::AuthDenied) => Self::PermissionDenied,
				Some(ProvisionErrorKind::Timeout) => Self::DeadlineExceeded,
				Some(ProvisionErrorKind::Filesystem) => Self::Internal,
				_ => Self::Unavailable,
			},
			Error::Registry(RegistryError::NotFound { .. }) => Self::NotFound,
			Error::Registry(RegistryError::AlreadyDeleting { .. }) => Self::Aborted,
			Error::Registry(_) => Self::Internal,
			Error::Filesystem(FilesystemError::PermissionDenied { .. }) => Self::PermissionDenied,
			Error::Filesystem(_) => Self::Internal,
			Error::Config(_) => Self::FailedPrecondition,
			Error::Transport(_) => Self::Unavailable,
		}
	}
}
impl From<&Error> for Response {
	fn from(err: &Error) -> Self {
		Self::error(StatusCode::of(err), err.to_string())
	}
}

/// Executes one request against `manager`.
pub async fn dispatch(manager: &LeaseManager, request: Request) -> Response {
	let method = request.method();
	let response = match request {
		Request::AddKerberosLease { credspec_contents } =>
			match manager.create_lease(&credspec_contents).await {
				Ok(created) => Response::AddKerberosLease(created.into()),
				Err(e) => Response::from(&e),
			},
		Request::DeleteKerberosLease { lease_id } => match LeaseId::new(&lease_id) {
			Ok(lease_id) => match manager.delete_lease(&lease_id).await {
				Ok(deleted) => Response::DeleteKerberosLease(deleted.into()),
				Err(e) => Response::from(&e),
			},
			Err(e) => Response::from(&Error::from(e)),
		},
		Request::HealthCheck => Response::HealthCheck(HealthCheckResponse {
			status: SERVING.into(),
			active_leases: manager.active_leases(),
		}),
	};

	if let Response::Error(ErrorResponse { code, message }) = &response {
		tracing::warn!(method, code = %code, "{message}");
	}

	response
}
