//! Logging setup

use crate::{constants::defaults, states::Config};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over the default filter. Production logs are JSON lines.
pub(crate) fn setup_logging(config: &Config) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(defaults::LOG_FILTER))?;

	let registry = tracing_subscriber::registry().with(filter);

	if config.production {
		registry.with(fmt::layer().json()).try_init()?;
	} else {
		registry.with(fmt::layer().with_target(true)).try_init()?;
	}

	tracing::debug!(production = config.production, "logging initialized");

	Ok(())
}
