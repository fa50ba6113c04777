//! The carrier loop.
//!
//! The carrier needs no timing of its own: once the generator is running it is left alone until
//! shutdown, and the worker only polls for the stop condition.

use std::{thread, time::Duration};
use hw::{CarrierGenerator, ClockSolution, solve, solver::{LOOPS_MAX, LOOPS_MIN, REFERENCE_HZ, TARGET_HZ}};
use tracing::{info, warn};
use crate::{
	config::TransmissionConfig,
	error::Error,
	realtime::{self, CARRIER_CORE},
	shutdown::Shutdown
};

/// How often the idle carrier worker checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Find the generator settings for the DCF77 carrier.
pub fn carrier_settings() -> Result<ClockSolution, Error> {
	let s = solve(REFERENCE_HZ, TARGET_HZ, LOOPS_MIN, LOOPS_MAX)?;
	info!(
		loops = s.loops,
		ideal_divider = s.ideal_divider,
		divider = s.divider,
		frequency = s.frequency,
		error = s.error,
		"carrier solution"
	);
	Ok(s)
}

/// Start the carrier and keep it running until the transmission output is released after a stop.
pub fn run_carrier<G>(generator: &mut G, shutdown: &Shutdown) -> Result<(), Error>
where G: CarrierGenerator + ?Sized
{
	let s = carrier_settings()?;
	generator.configure(s.loops, s.divider)?;
	generator.enable()?;
	info!("carrier enabled");

	while !shutdown.should_stop_carrier() {
		thread::sleep(POLL_INTERVAL);
	}

	generator.disable()?;
	info!("carrier disabled");
	Ok(())
}

/// Body of the carrier worker thread.
///
/// Always releases the generator and reports the exit to `shutdown`.
pub fn carrier_worker<G>(config: &TransmissionConfig, mut generator: G, shutdown: &Shutdown)
	-> Result<(), Error>
where G: CarrierGenerator
{
	if config.realtime {
		realtime::setup_current_thread("carrier", CARRIER_CORE);
	}

	let result = run_carrier(&mut generator, shutdown);
	if let Err(e) = &result {
		warn!(error = %e, "carrier failed");
	}

	let released = generator.release().map_err(Error::from);
	if let Err(e) = &released {
		warn!(error = %e, "failed to release carrier");
	}
	shutdown.worker_finished();
	result.and(released)
}
