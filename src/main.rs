//! `credentials-fetcherd`: serves lease requests on the local socket until SIGINT or SIGTERM.

// std
use std::process::ExitCode;
// crates.io
use clap::Parser;
use tokio::signal::{
	self,
	unix::{self as unix_signal, SignalKind},
};
// self
use credentials_fetcher::{config::DaemonConfig, manager::LeaseManager, obs, rpc::RpcServer};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
	let config = DaemonConfig::parse();

	if let Err(e) = obs::init_subscriber(config.log_format) {
		eprintln!("Failed to install the log subscriber: {e}");

		return ExitCode::FAILURE;
	}

	match run(config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!("{e}");

			ExitCode::FAILURE
		},
	}
}

async fn run(config: DaemonConfig) -> Result<(), BoxError> {
	config.validate()?;

	tracing::info!(?config, "Starting credentials-fetcher.");

	tokio::fs::create_dir_all(&config.krb_dir).await?;

	let manager = LeaseManager::from_config(&config)?;

	if !manager.registry().is_empty() {
		tracing::info!(leases = manager.active_leases(), "Restored leases from the snapshot.");
	}

	if config.skip_reconcile {
		tracing::warn!("Skipping orphaned lease directory cleanup.");
	} else {
		manager.reconcile().await?;
	}

	let served =
		RpcServer::bind(&config.socket_path, manager.clone())?.serve(shutdown_signal()).await;

	if let Err(e) = manager.registry().flush().await {
		tracing::warn!("Final lease snapshot was not written: {e}");
	}

	served?;

	Ok(())
}

async fn shutdown_signal() {
	let mut terminate = match unix_signal::signal(SignalKind::terminate()) {
		Ok(terminate) => terminate,
		Err(e) => {
			tracing::warn!("Cannot listen for SIGTERM, relying on SIGINT only: {e}");

			if let Err(e) = signal::ctrl_c().await {
				tracing::error!("Cannot listen for SIGINT: {e}");
			}

			return;
		},
	};

	tokio::select! {
		_ = signal::ctrl_c() => (),
		_ = terminate.recv() => (),
	}

	tracing::info!("Shutdown requested.");
}
