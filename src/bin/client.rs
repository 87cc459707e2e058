//! `credentials-fetcher-client`: command-line client for the daemon socket.

// std
use std::{fs, path::PathBuf, process::ExitCode};
// crates.io
use clap::{Parser, Subcommand};
// self
use credentials_fetcher::{
	config::DEFAULT_SOCKET_PATH,
	rpc::{AddKerberosLeaseResponse, DeleteKerberosLeaseResponse, RpcClient},
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
	/// Daemon socket to connect to.
	#[arg(long, global = true, default_value = DEFAULT_SOCKET_PATH, env("CF_SOCKET_PATH"))]
	socket_path: PathBuf,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Request a lease for every account in the given credential spec files.
	Add {
		/// Credential spec JSON files.
		#[arg(required = true)]
		credspecs: Vec<PathBuf>,
	},
	/// Revoke a lease and delete its tickets.
	Delete {
		/// Lease identifier returned by `add`.
		lease_id: String,
	},
	/// Add a lease for the given credential specs, then delete it again.
	RoundTrip {
		/// Credential spec JSON files.
		#[arg(required = true)]
		credspecs: Vec<PathBuf>,
	},
	/// Check that the daemon is serving.
	Health,
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	match run(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("{e}");

			ExitCode::FAILURE
		},
	}
}

async fn run(cli: Cli) -> Result<(), BoxError> {
	let mut client = RpcClient::connect(&cli.socket_path).await?;

	match cli.command {
		Command::Add { credspecs } => {
			let added = client.add_kerberos_lease(read_credspecs(&credspecs)?).await?;

			print_added(&added);
		},
		Command::Delete { lease_id } => {
			let deleted = client.delete_kerberos_lease(lease_id).await?;

			print_deleted(&deleted);
		},
		Command::RoundTrip { credspecs } => {
			let added = client.add_kerberos_lease(read_credspecs(&credspecs)?).await?;

			print_added(&added);

			let deleted = client.delete_kerberos_lease(added.lease_id).await?;

			print_deleted(&deleted);
		},
		Command::Health => {
			let health = client.health_check().await?;

			println!("{} ({} active leases)", health.status, health.active_leases);
		},
	}

	Ok(())
}

fn read_credspecs(paths: &[PathBuf]) -> Result<Vec<String>, BoxError> {
	paths
		.iter()
		.map(|path| {
			fs::read_to_string(path)
				.map_err(|e| BoxError::from(format!("Failed to read {}: {e}", path.display())))
		})
		.collect()
}

fn print_added(added: &AddKerberosLeaseResponse) {
	for path in &added.created_kerberos_file_paths {
		println!("created ticket file path: {path}");
	}
	for failed in &added.failed_accounts {
		eprintln!("failed account {}: {}", failed.account, failed.error);
	}

	println!("lease id: {}", added.lease_id);
}

fn print_deleted(deleted: &DeleteKerberosLeaseResponse) {
	for path in &deleted.deleted_kerberos_file_paths {
		println!("deleted ticket file path: {path}");
	}

	println!("deleted lease id: {}", deleted.lease_id);
}
