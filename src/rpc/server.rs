//! Unix socket server driving [`dispatch`](crate::rpc::dispatch).

// std
use std::{
	fs::{self, Permissions},
	io::{self, ErrorKind},
	os::unix::fs::{FileTypeExt, PermissionsExt},
	time::Duration as StdDuration,
};
// crates.io
use tokio::net::{UnixListener, UnixStream};
// self
use crate::{
	_prelude::*,
	error::{FilesystemError, TransportError},
	manager::LeaseManager,
	rpc::{self, Request, Response, StatusCode, protocol},
};

const SOCKET_MODE: u32 = 0o660;
const ACCEPT_BACKOFF: StdDuration = StdDuration::from_millis(100);

/// Listener bound to the daemon socket.
#[derive(Debug)]
pub struct RpcServer {
	listener: UnixListener,
	socket_path: PathBuf,
	manager: LeaseManager,
}
impl RpcServer {
	/// Binds `socket_path`, replacing a stale socket left by an earlier run.
	///
	/// Must be called from within a Tokio runtime.
	pub fn bind(socket_path: impl Into<PathBuf>, manager: LeaseManager) -> Result<Self> {
		let socket_path = socket_path.into();

		if let Some(parent) = socket_path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| FilesystemError::from_io(parent, e))?;
		}

		remove_stale_socket(&socket_path)?;

		let listener =
			UnixListener::bind(&socket_path).map_err(|e| FilesystemError::from_io(&socket_path, e))?;

		fs::set_permissions(&socket_path, Permissions::from_mode(SOCKET_MODE))
			.map_err(|e| FilesystemError::from_io(&socket_path, e))?;

		Ok(Self { listener, socket_path, manager })
	}

	/// Path the server listens on.
	pub fn socket_path(&self) -> &Path {
		&self.socket_path
	}

	/// Accepts connections until `shutdown` resolves, then removes the socket file.
	///
	/// Requests already executing keep running on the runtime after this returns.
	pub async fn serve<F>(self, shutdown: F) -> Result<()>
	where
		F: Future<Output = ()>,
	{
		let mut shutdown = std::pin::pin!(shutdown);

		tracing::info!(socket = %self.socket_path.display(), "Serving lease requests.");

		loop {
			tokio::select! {
				_ = &mut shutdown => break,
				accepted = self.listener.accept() => match accepted {
					Ok((stream, _)) => {
						let manager = self.manager.clone();

						tokio::spawn(async move {
							if let Err(e) = serve_connection(stream, manager).await {
								tracing::warn!("Connection closed abnormally: {e}");
							}
						});
					},
					Err(e) => {
						tracing::warn!("Failed to accept a connection: {e}");

						tokio::time::sleep(ACCEPT_BACKOFF).await;
					},
				},
			}
		}

		tracing::info!(socket = %self.socket_path.display(), "Stopped accepting requests.");

		match fs::remove_file(&self.socket_path) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(FilesystemError::from_io(&self.socket_path, e).into()),
		}
	}
}

fn remove_stale_socket(path: &Path) -> Result<(), FilesystemError> {
	let metadata = match fs::symlink_metadata(path) {
		Ok(metadata) => metadata,
		Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
		Err(e) => return Err(FilesystemError::from_io(path, e)),
	};

	if !metadata.file_type().is_socket() {
		return Err(FilesystemError::from_io(
			path,
			io::Error::new(ErrorKind::AlreadyExists, "refusing to replace a non-socket file"),
		));
	}

	tracing::debug!("Removing stale socket {}.", path.display());

	fs::remove_file(path).map_err(|e| FilesystemError::from_io(path, e))
}

/// Serves request/response pairs until the peer hangs up.
///
/// Each request runs in its own task so a peer that disconnects mid-request cannot cancel
/// provisioning or deletion halfway.
async fn serve_connection(
	mut stream: UnixStream,
	manager: LeaseManager,
) -> Result<(), TransportError> {
	loop {
		let request = match protocol::read_frame::<_, Request>(&mut stream).await {
			Ok(Some(request)) => request,
			Ok(None) => return Ok(()),
			Err(TransportError::Codec(e)) => {
				let response =
					Response::error(StatusCode::InvalidArgument, format!("Undecodable request: {e}."));

				protocol::write_frame(&mut stream, &response).await?;

				continue;
			},
			Err(e @ TransportError::FrameTooLarge { .. }) => {
				let response = Response::error(StatusCode::InvalidArgument, e.to_string());

				protocol::write_frame(&mut stream, &response).await?;

				return Err(e);
			},
			Err(e) => return Err(e),
		};
		let manager = manager.clone();
		let response =
			match tokio::spawn(async move { rpc::dispatch(&manager, request).await }).await {
				Ok(response) => response,
				Err(e) => Response::error(StatusCode::Internal, format!("Request task failed: {e}.")),
			};

		protocol::write_frame(&mut stream, &response).await?;
	}
}
