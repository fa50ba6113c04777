use std::{process::ExitCode, sync::Arc};
use clap::Parser;
use tracing::error;
use dcf77tx::{args::Arguments, config::TransmissionConfig, logging};

fn main() -> ExitCode {
	let config = TransmissionConfig::from(Arguments::parse());
	if let Err(e) = logging::init(config.verbose) {
		eprintln!("{e}");
		return ExitCode::FAILURE;
	}

	match dcf77tx::run(Arc::new(config)) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!(error = %e, "transmitter failed");
			ExitCode::FAILURE
		}
	}
}
