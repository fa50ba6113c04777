//! Cross-thread termination protocol.
//!
//! Both workers poll a lock-free stop flag. Whichever worker finishes first records the exit
//! code and wakes the supervisor, which then raises the stop flag so the other worker follows.
//! The carrier additionally waits until the attenuation output has been released, so the
//! transmitter never ends up emitting a half-modulated carrier.

use std::sync::{
	Arc, Condvar, Mutex, MutexGuard, PoisonError,
	atomic::{AtomicBool, Ordering}
};

/// Exit code while both workers are running.
pub const RUNNING: i32 = 0;

/// Exit code once a worker has finished.
pub const WORKER_FINISHED: i32 = 2;

/// Shared shutdown state.
///
/// # Examples
///
/// ```
/// # use dcf77tx::shutdown::{Shutdown, WORKER_FINISHED};
/// # use std::thread;
/// let shutdown = Shutdown::new();
/// let worker = {
/// 	let shutdown = shutdown.clone();
/// 	thread::spawn(move || {
/// 		// Do some work, then finish
/// 		shutdown.worker_finished();
/// 	})
/// };
///
/// assert_eq!(shutdown.wait_for_any_exit(), WORKER_FINISHED);
/// shutdown.signal_stop();
/// worker.join().unwrap();
/// ```
#[derive(Debug)]
pub struct Shutdown {
	/// Set once by a signal or by the supervisor.
	stop: AtomicBool,
	/// Set once the attenuation output is released.
	output_released: AtomicBool,
	/// First worker exit code, [`RUNNING`] until then.
	exit: Mutex<i32>,
	/// Wakes the supervisor on exit or stop.
	cond: Condvar
}

impl Shutdown {
	/// Create a new [`Shutdown`] with both workers running.
	pub fn new() -> Arc<Shutdown> {
		Arc::new(Shutdown {
			stop: AtomicBool::new(false),
			output_released: AtomicBool::new(false),
			exit: Mutex::new(RUNNING),
			cond: Condvar::new()
		})
	}

	fn lock(&self) -> MutexGuard<'_, i32> {
		self.exit.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Ask both workers to stop and wake the supervisor.
	pub fn signal_stop(&self) {
		self.stop.store(true, Ordering::Release);
		// Taking the lock orders the store before a waiter's predicate check
		let _guard = self.lock();
		self.cond.notify_all();
	}

	/// Whether the workers have been asked to stop.
	#[inline(always)]
	pub fn should_stop(&self) -> bool {
		self.stop.load(Ordering::Acquire)
	}

	/// Record that the attenuation output is released.
	pub fn mark_output_released(&self) {
		self.output_released.store(true, Ordering::Release);
	}

	/// Whether the carrier may stop: a stop was requested and the attenuation output is released.
	#[inline(always)]
	pub fn should_stop_carrier(&self) -> bool {
		self.should_stop() && self.output_released.load(Ordering::Acquire)
	}

	/// Record that a worker has finished.
	///
	/// Only the first call sets the exit code and wakes the supervisor. Returns whether this call
	/// was the first.
	pub fn worker_finished(&self) -> bool {
		let mut exit = self.lock();
		if *exit != RUNNING {
			return false;
		}
		*exit = WORKER_FINISHED;
		self.cond.notify_all();
		true
	}

	/// Block until a worker finishes or a stop is requested, returning the exit code.
	///
	/// The code is [`RUNNING`] if the wakeup was a stop request with both workers still running.
	pub fn wait_for_any_exit(&self) -> i32 {
		let guard = self.lock();
		let guard = self.cond
			.wait_while(guard, |exit| *exit == RUNNING && !self.should_stop())
			.unwrap_or_else(PoisonError::into_inner);
		*guard
	}

	/// The current exit code.
	pub fn exit_code(&self) -> i32 {
		*self.lock()
	}
}
