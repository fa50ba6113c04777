//! Process and thread setup for low-jitter timing.
//!
//! Memory is locked once for the whole process. Each thread then pins itself to its own core and
//! switches to `SCHED_FIFO`. None of this is required for correct output, so failures (typically
//! from running without root) are logged and ignored.

use std::io;
use tracing::{debug, warn};

/// Core of the supervising thread.
pub const SUPERVISOR_CORE: usize = 2;

/// Core of the carrier worker.
pub const CARRIER_CORE: usize = 1;

/// Core of the transmission worker.
pub const TRANSMISSION_CORE: usize = 3;

/// `SCHED_FIFO` priority of every thread.
pub const PRIORITY: i32 = 99;

/// Lock all current and future pages of the process in memory.
pub fn lock_memory() -> io::Result<()> {
	// Safety: mlockall has no memory safety preconditions
	if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } != 0 {
		return Err(io::Error::last_os_error());
	}
	Ok(())
}

/// Pin the calling thread to `core`.
pub fn pin_current_thread(core: usize) -> io::Result<()> {
	if core >= libc::CPU_SETSIZE as usize {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("no such core {core}")));
	}
	// Safety: cpu_set_t is a plain bit set, all-zero is the empty set
	let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
	// Safety: core is within the set
	unsafe { libc::CPU_SET(core, &mut set) };
	// Safety: set is a valid cpu_set_t of the given size, pid 0 is the calling thread
	if unsafe { libc::sched_setaffinity(0, size_of::<libc::cpu_set_t>(), &set) } != 0 {
		return Err(io::Error::last_os_error());
	}
	Ok(())
}

/// Switch the calling thread to `SCHED_FIFO` at `priority`.
pub fn set_realtime_priority(priority: i32) -> io::Result<()> {
	// Safety: sched_param is plain old data, some targets carry extra fields
	let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
	param.sched_priority = priority;
	// Safety: param is a valid sched_param and pthread_self is always a valid thread
	let r = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
	if r != 0 {
		return Err(io::Error::from_raw_os_error(r));
	}
	Ok(())
}

/// Lock memory, logging a warning on failure.
pub fn lock_memory_or_warn() {
	match lock_memory() {
		Ok(()) => debug!("memory locked"),
		Err(e) => warn!(error = %e, "failed to lock memory")
	}
}

/// Pin the calling thread to `core` and make it real-time, logging warnings on failure.
pub fn setup_current_thread(name: &str, core: usize) {
	if let Err(e) = pin_current_thread(core) {
		warn!(thread = name, core, error = %e, "failed to set CPU affinity");
	}
	match set_realtime_priority(PRIORITY) {
		Ok(()) => debug!(thread = name, core, priority = PRIORITY, "real-time scheduling enabled"),
		Err(e) => warn!(thread = name, error = %e, "failed to set real-time priority")
	}
}
