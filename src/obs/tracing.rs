// crates.io
use tracing::{Span, field, instrument::Instrumented};
use tracing_subscriber::EnvFilter;
// self
use crate::{_prelude::*, account::LeaseId, config::LogFormat, obs::LeaseOp};

const DEFAULT_FILTER: &str = "info";

/// A span builder used by lease operations.
#[derive(Clone, Debug)]
pub struct LeaseSpan {
	span: Span,
}
impl LeaseSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: LeaseOp, stage: &'static str) -> Self {
		let span = tracing::info_span!(
			"credentials_fetcher.lease",
			op = op.as_str(),
			stage,
			lease_id = field::Empty
		);

		Self { span }
	}

	/// Attaches the lease identifier once it is known.
	pub fn record_lease_id(&self, lease_id: &LeaseId) {
		self.span.record("lease_id", field::display(lease_id));
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}

/// Installs the global subscriber, honoring `RUST_LOG` and falling back to `info`.
pub fn init_subscriber(format: LogFormat) -> Result<(), Box<dyn StdError + Send + Sync>> {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
	let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

	match format {
		LogFormat::Json => builder.json().with_current_span(false).try_init(),
		LogFormat::Text => builder.try_init(),
	}
}
