//! [`TicketAcquirer`] that shells out to MIT `kinit`.
//!
//! Each acquisition runs `kinit -c FILE:<scratch> [-k -t <keytab>] <principal>` into a private
//! scratch cache, reads the cache back, and removes it. The principal's keys must be reachable
//! by `kinit`, typically through the configured keytab.

// std
use std::{fs, io::ErrorKind, process::Output};
// crates.io
use rand::{Rng, distr::Alphanumeric};
use tokio::process::Command;
// self
use crate::{
	_prelude::*,
	account::AccountIdentity,
	acquire::{AcquireError, AcquireErrorKind, AcquireFuture, TicketAcquirer},
	ticket::TicketMaterial,
};

const SCRATCH_SUFFIX_LEN: usize = 16;
const STDERR_PREVIEW_LIMIT: usize = 256;

/// Drives the system `kinit` binary to obtain ticket caches.
#[derive(Clone, Debug)]
pub struct KinitAcquirer {
	program: PathBuf,
	keytab: Option<PathBuf>,
	scratch_dir: PathBuf,
}
impl KinitAcquirer {
	/// Creates an acquirer running `program`, staging caches under `scratch_dir`.
	pub fn new(program: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
		Self { program: program.into(), keytab: None, scratch_dir: scratch_dir.into() }
	}

	/// Authenticates with keys from `keytab` (`kinit -k -t`).
	pub fn with_keytab(mut self, keytab: impl Into<PathBuf>) -> Self {
		self.keytab = Some(keytab.into());

		self
	}

	fn scratch_path(&self) -> PathBuf {
		let suffix: String = rand::rng()
			.sample_iter(Alphanumeric)
			.take(SCRATCH_SUFFIX_LEN)
			.map(char::from)
			.collect();

		self.scratch_dir.join(format!(".acquire-{suffix}"))
	}

	async fn run(&self, identity: &AccountIdentity) -> Result<TicketMaterial, AcquireError> {
		tokio::fs::create_dir_all(&self.scratch_dir).await.map_err(|e| {
			AcquireError::transient(format!(
				"cannot create scratch directory {}: {e}",
				self.scratch_dir.display()
			))
		})?;

		let scratch = ScratchCache(self.scratch_path());
		let mut command = Command::new(&self.program);

		command.arg("-c").arg(format!("FILE:{}", scratch.0.display()));

		if let Some(keytab) = &self.keytab {
			command.arg("-k").arg("-t").arg(keytab);
		}

		command.arg(identity.principal()).kill_on_drop(true);

		tracing::debug!(principal = %identity, program = %self.program.display(), "Running kinit.");

		let output = command.output().await.map_err(|e| {
			AcquireError::transient(format!("cannot run {}: {e}", self.program.display()))
		})?;

		if !output.status.success() {
			return Err(classify_failure(&output));
		}

		let bytes = tokio::fs::read(&scratch.0).await.map_err(|e| {
			AcquireError::transient(format!("kinit reported success but left no cache: {e}"))
		})?;

		Ok(TicketMaterial::new(bytes))
	}
}
impl TicketAcquirer for KinitAcquirer {
	fn acquire<'a>(&'a self, identity: &'a AccountIdentity) -> AcquireFuture<'a> {
		Box::pin(self.run(identity))
	}
}

/// Scratch cache path removed when the acquisition finishes or is dropped.
struct ScratchCache(PathBuf);
impl Drop for ScratchCache {
	fn drop(&mut self) {
		match fs::remove_file(&self.0) {
			Err(e) if e.kind() != ErrorKind::NotFound => {
				tracing::warn!(path = %self.0.display(), "Failed to remove scratch cache: {e}.");
			},
			_ => (),
		}
	}
}

fn classify_failure(output: &Output) -> AcquireError {
	let stderr = String::from_utf8_lossy(&output.stderr);
	let message = truncate_preview(stderr.trim());
	let kind = classify_stderr(&message);

	AcquireError::new(kind, format!("kinit exited with {}: {message}", output.status))
}

fn classify_stderr(stderr: &str) -> AcquireErrorKind {
	let lowered = stderr.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("not found in kerberos database")
			|| text.contains("client not found") =>
			AcquireErrorKind::AccountNotFound,
		text if text.contains("preauthentication failed")
			|| text.contains("password incorrect")
			|| text.contains("key table entry not found")
			|| text.contains("revoked")
			|| text.contains("permission denied") =>
			AcquireErrorKind::AuthDenied,
		text if text.contains("timed out") || text.contains("timeout") =>
			AcquireErrorKind::Timeout,
		_ => AcquireErrorKind::Transient,
	}
}

fn truncate_preview(text: &str) -> String {
	if text.chars().count() <= STDERR_PREVIEW_LIMIT {
		return text.to_owned();
	}

	let mut buf: String = text.chars().take(STDERR_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::account::{AccountName, Realm};

	fn identity(name: &str) -> AccountIdentity {
		AccountIdentity::new(
			AccountName::new(name).expect("Account fixture should be valid."),
			Realm::new("contoso.com").expect("Realm fixture should be valid."),
		)
	}

	#[test]
	fn stderr_classification_covers_mit_messages() {
		assert_eq!(
			classify_stderr(
				"kinit: Client 'WebApp09$@CONTOSO.COM' not found in Kerberos database while getting initial credentials"
			),
			AcquireErrorKind::AccountNotFound
		);
		assert_eq!(
			classify_stderr("kinit: Preauthentication failed while getting initial credentials"),
			AcquireErrorKind::AuthDenied
		);
		assert_eq!(
			classify_stderr(
				"kinit: Keytab contains no suitable keys for WebApp01$@CONTOSO.COM: Key table \
				 entry not found"
			),
			AcquireErrorKind::AuthDenied
		);
		assert_eq!(
			classify_stderr("kinit: Cannot contact any KDC for realm 'CONTOSO.COM'"),
			AcquireErrorKind::Transient
		);
		assert_eq!(classify_stderr("kinit: Request timed out"), AcquireErrorKind::Timeout);
	}

	#[test]
	fn long_stderr_is_truncated() {
		let preview = truncate_preview(&"x".repeat(STDERR_PREVIEW_LIMIT + 10));

		assert_eq!(preview.chars().count(), STDERR_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
	}

	#[tokio::test]
	async fn missing_program_is_transient_and_leaves_no_scratch() {
		let scratch_dir = env::temp_dir().join(format!(
			"credentials_fetcher_kinit_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		));
		let acquirer =
			KinitAcquirer::new("/nonexistent/credentials-fetcher/kinit", &scratch_dir);
		let err = acquirer
			.acquire(&identity("WebApp01"))
			.await
			.expect_err("A missing kinit binary must fail.");

		assert_eq!(err.kind, AcquireErrorKind::Transient);

		let leftovers = fs::read_dir(&scratch_dir)
			.expect("Scratch directory should have been created.")
			.count();

		assert_eq!(leftovers, 0);

		fs::remove_dir_all(&scratch_dir).unwrap_or_else(|e| {
			panic!("Failed to remove scratch directory {}: {e}", scratch_dir.display())
		});
	}
}
