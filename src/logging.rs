//! Log output.
//!
//! Everything goes to stderr through a `tracing-subscriber` formatter. `RUST_LOG` overrides the
//! default filter, which is `info`, or `debug` with `--verbose` so every second is logged.

use tracing_subscriber::{EnvFilter, fmt};
use crate::error::Error;

/// The filter used when `RUST_LOG` is unset or invalid.
pub fn default_directive(verbose: bool) -> &'static str {
	if verbose { "debug" } else { "info" }
}

/// Install the global log subscriber.
///
/// # Errors
///
/// Returns [`Error::Logging`] if a subscriber is already installed.
pub fn init(verbose: bool) -> Result<(), Error> {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
	fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_thread_names(true)
		.try_init()
		.map_err(|e| Error::Logging(e.to_string()))
}
