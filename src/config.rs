//! Daemon configuration from command-line flags and environment variables.

// std
use std::time::Duration as StdDuration;
// crates.io
use clap::{ArgAction, Parser, ValueEnum};
// self
use crate::{_prelude::*, error::ConfigError};

/// Default Unix socket the daemon listens on.
pub const DEFAULT_SOCKET_PATH: &str =
	"/usr/share/credentials-fetcher/socket/credentials_fetcher.sock";
/// Default directory holding every lease directory.
pub const DEFAULT_KRB_DIR: &str = "/var/credentials-fetcher/krbdir";

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	/// One JSON object per event.
	#[default]
	Json,
	/// Human-readable lines.
	Text,
}

/// Runtime options of the credentials-fetcher daemon.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
pub struct DaemonConfig {
	/// Unix socket to serve requests on.
	#[arg(long, default_value = DEFAULT_SOCKET_PATH, env("CF_SOCKET_PATH"))]
	pub socket_path: PathBuf,
	/// Directory ticket caches are written under.
	#[arg(long, default_value = DEFAULT_KRB_DIR, env("CF_KRB_DIR"))]
	pub krb_dir: PathBuf,
	/// JSON file mirroring the lease registry; leases are memory-only when unset.
	#[arg(long, env("CF_REGISTRY_SNAPSHOT"))]
	pub registry_snapshot: Option<PathBuf>,
	/// Seconds to wait for one ticket acquisition.
	#[arg(long, default_value_t = 30, env("CF_ACQUIRE_TIMEOUT_SECS"))]
	pub acquire_timeout_secs: u64,
	/// Upper bound on acquisitions running at once.
	#[arg(long, default_value_t = 8, env("CF_MAX_CONCURRENT_ACQUISITIONS"))]
	pub max_concurrent_acquisitions: usize,
	/// `kinit` binary used to acquire tickets.
	#[arg(long, default_value = "kinit", env("CF_KINIT_PATH"))]
	pub kinit_path: PathBuf,
	/// Keytab holding the keys of the provisioned accounts.
	#[arg(long, env("CF_KEYTAB"))]
	pub keytab: Option<PathBuf>,
	/// Skip removing orphaned lease directories at startup.
	#[arg(long, default_value = "false", env("CF_SKIP_RECONCILE"), action = ArgAction::SetTrue)]
	pub skip_reconcile: bool,
	/// Log output format.
	#[arg(long, value_enum, default_value_t = LogFormat::Json, env("CF_LOG_FORMAT"))]
	pub log_format: LogFormat,
}
impl DaemonConfig {
	/// Checks constraints clap cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		for (option, path) in [
			("socket-path", Some(&self.socket_path)),
			("krb-dir", Some(&self.krb_dir)),
			("registry-snapshot", self.registry_snapshot.as_ref()),
			("keytab", self.keytab.as_ref()),
		] {
			if let Some(path) = path.filter(|path| !path.is_absolute()) {
				return Err(ConfigError::RelativePath { option, path: path.clone() });
			}
		}
		if self.acquire_timeout_secs == 0 {
			return Err(ConfigError::ZeroValue { option: "acquire-timeout-secs" });
		}
		if self.max_concurrent_acquisitions == 0 {
			return Err(ConfigError::ZeroValue { option: "max-concurrent-acquisitions" });
		}

		Ok(())
	}

	/// Acquisition timeout as a [`StdDuration`].
	pub fn acquire_timeout(&self) -> StdDuration {
		StdDuration::from_secs(self.acquire_timeout_secs)
	}

	/// Directory `kinit` stages caches in before they are copied into a lease.
	pub fn scratch_dir(&self) -> PathBuf {
		self.krb_dir.join(".scratch")
	}
}
impl Default for DaemonConfig {
	fn default() -> Self {
		Self {
			socket_path: DEFAULT_SOCKET_PATH.into(),
			krb_dir: DEFAULT_KRB_DIR.into(),
			registry_snapshot: None,
			acquire_timeout_secs: 30,
			max_concurrent_acquisitions: 8,
			kinit_path: "kinit".into(),
			keytab: None,
			skip_reconcile: false,
			log_format: LogFormat::Json,
		}
	}
}
