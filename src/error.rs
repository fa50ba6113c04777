//! Error types used across modules.
//!
//! Each collaborator crate has its own error type; [`Error`] wraps them so workers and startup
//! can propagate any failure with `?`.

use std::io;
use thiserror::Error;
use hw::{CarrierError, GpioError, SolverError};
use sntp::NtpError;
use time::ClockError;

/// The error type for the transmitter.
#[derive(Debug, Error)]
pub enum Error {
	/// The network time reference failed.
	#[error(transparent)]
	Ntp(#[from] NtpError),
	/// The attenuation output failed.
	#[error(transparent)]
	Gpio(#[from] GpioError),
	/// The carrier generator failed.
	#[error(transparent)]
	Carrier(#[from] CarrierError),
	/// No carrier settings fit the generator.
	#[error(transparent)]
	Solver(#[from] SolverError),
	/// An absolute clock sleep failed.
	#[error(transparent)]
	Clock(#[from] ClockError),
	/// The system clock could not be read.
	#[error("system clock unavailable")]
	ClockUnavailable,
	/// The timestamp cannot be encoded as a DCF77 minute (before the epoch or outside 2000-2099).
	/// The timestamp is the payload.
	#[error("unsupported time: {0}")]
	UnsupportedTime(i64),
	/// The signal handler could not be installed.
	#[error("failed to install signal handler: {0}")]
	Signal(#[from] ctrlc::Error),
	/// A worker thread could not be started.
	#[error("failed to spawn {name} worker: {source}")]
	Spawn { name: &'static str, source: io::Error },
	/// A worker thread panicked. The worker name is the payload.
	#[error("{0} worker panicked")]
	WorkerPanicked(&'static str),
	/// The log subscriber could not be installed.
	#[error("failed to initialize logging: {0}")]
	Logging(String)
}
