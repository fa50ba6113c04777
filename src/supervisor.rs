//! Worker supervision.
//!
//! The supervisor starts the carrier worker, then the transmission worker, and sleeps until either
//! finishes or a stop is requested. Teardown is ordered: the transmission worker is joined (and
//! its output released) before the carrier is allowed to stop.

use std::{sync::Arc, thread::{self, JoinHandle}};
use hw::{CarrierGenerator, DigitalOutput};
use time::Clock;
use tracing::{debug, info, warn};
use crate::{
	carrier::carrier_worker,
	config::TransmissionConfig,
	error::Error,
	shutdown::Shutdown,
	source::TimeReference,
	transmit::transmission_worker
};

/// Reports a worker exit when dropped, so a panicking worker still wakes the supervisor.
struct ExitGuard<'a>(&'a Shutdown);

impl Drop for ExitGuard<'_> {
	fn drop(&mut self) {
		self.0.worker_finished();
	}
}

fn spawn<F>(name: &'static str, shutdown: Arc<Shutdown>, f: F) -> Result<JoinHandle<Result<(), Error>>, Error>
where F: FnOnce(&Shutdown) -> Result<(), Error> + Send + 'static
{
	thread::Builder::new()
		.name(String::from(name))
		.spawn(move || {
			let _guard = ExitGuard(&shutdown);
			f(&shutdown)
		})
		.map_err(|source| Error::Spawn { name, source })
}

fn join(name: &'static str, handle: JoinHandle<Result<(), Error>>) -> Result<(), Error> {
	handle.join().unwrap_or(Err(Error::WorkerPanicked(name)))
}

/// Stop a carrier worker whose transmission worker never started.
///
/// The carrier's own result is logged and returned so it is not lost behind the spawn error.
fn abandon_carrier(shutdown: &Shutdown, carrier: JoinHandle<Result<(), Error>>) -> Result<(), Error> {
	// The output was never claimed
	shutdown.signal_stop();
	shutdown.mark_output_released();
	let result = join("carrier", carrier);
	if let Err(e) = &result {
		warn!(error = %e, "carrier worker failed after transmission spawn failure");
	}
	result
}

/// Run both workers to completion.
///
/// Returns the transmission worker's error if it failed, otherwise the carrier worker's.
pub fn run_workers<K, O, G>(
	config: Arc<TransmissionConfig>,
	clock: Arc<K>,
	output: O,
	generator: G,
	reference: TimeReference,
	shutdown: Arc<Shutdown>
) -> Result<(), Error>
where K: Clock + 'static, O: DigitalOutput + 'static, G: CarrierGenerator + 'static
{
	let carrier = {
		let config = config.clone();
		spawn("carrier", shutdown.clone(), move |shutdown| carrier_worker(&config, generator, shutdown))?
	};

	let transmission = spawn("transmission", shutdown.clone(), move |shutdown| {
		transmission_worker(&config, &*clock, output, reference, shutdown)
	});
	let transmission = match transmission {
		Ok(handle) => handle,
		Err(e) => {
			// The spawn error takes precedence
			let _ = abandon_carrier(&shutdown, carrier);
			return Err(e);
		}
	};

	let code = shutdown.wait_for_any_exit();
	debug!(code, stop = shutdown.should_stop(), "supervisor woke");
	shutdown.signal_stop();

	let transmission = join("transmission", transmission);
	shutdown.mark_output_released();
	let carrier = join("carrier", carrier);
	info!(exit = shutdown.exit_code(), "workers stopped");

	transmission.and(carrier)
}
