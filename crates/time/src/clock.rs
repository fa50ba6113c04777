//! Wall clock abstraction for real-time scheduling.
//!
//! Real-time code never sleeps for a relative duration: every wait targets an absolute instant on
//! `CLOCK_REALTIME`, so a late wakeup in one second never accumulates into drift over the next.
//! [`Clock`] captures exactly the two operations that code needs, and [`SystemClock`] (feature
//! `now`) implements them on top of libc. Interrupted sleeps are retried inside
//! [`Clock::sleep_until`] and never surface to callers.
//!
//! # Examples
//!
//! ```ignore
//! # use time::{Clock, SystemClock, Seconds, TimeSpec};
//! let clock = SystemClock;
//! let now = clock.now().expect("clock_gettime failed");
//! // Wake exactly at the start of the next second
//! clock.sleep_until(TimeSpec::at(now.sec) + Seconds(1)).unwrap();
//! ```

use core::{error, fmt};
use crate::time::TimeSpec;

/// A wall clock that can be read and slept against.
///
/// Implementations must be shareable across threads; the transmitter reads the same clock from
/// several workers.
pub trait Clock: Send + Sync {
	/// Get the current time, or `None` if the clock cannot be read.
	fn now(&self) -> Option<TimeSpec>;

	/// Block the calling thread until the absolute instant `deadline`.
	///
	/// Returns immediately if `deadline` has already passed. Spurious and signal-induced wakeups
	/// are retried against the same absolute deadline.
	///
	/// # Errors
	///
	/// Returns [`ClockError`] if the underlying sleep fails for any reason other than
	/// interruption.
	fn sleep_until(&self, deadline: TimeSpec) -> Result<(), ClockError>;
}

impl<C: Clock + ?Sized> Clock for &C {
	fn now(&self) -> Option<TimeSpec> {
		(**self).now()
	}

	fn sleep_until(&self, deadline: TimeSpec) -> Result<(), ClockError> {
		(**self).sleep_until(deadline)
	}
}

/// The error type for clock operations. The payload is the OS error number.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ClockError(pub i32);

impl fmt::Display for ClockError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "absolute clock sleep failed (errno {})", self.0)
	}
}

impl fmt::Debug for ClockError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl error::Error for ClockError {}

/// The host's `CLOCK_REALTIME`.
#[cfg(feature = "now")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[cfg(feature = "now")]
impl Clock for SystemClock {
	fn now(&self) -> Option<TimeSpec> {
		crate::time::now()
	}

	fn sleep_until(&self, deadline: TimeSpec) -> Result<(), ClockError> {
		// Safety: timespec is plain old data, all-zero is a valid value on every target
		let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
		ts.tv_sec = deadline.sec as _;
		ts.tv_nsec = deadline.nsec as _;
		loop {
			// Safety: ts is a valid timespec and the remainder pointer is unused with TIMER_ABSTIME
			let r = unsafe {
				libc::clock_nanosleep(libc::CLOCK_REALTIME, libc::TIMER_ABSTIME, &ts, core::ptr::null_mut())
			};
			match r {
				0 => return Ok(()),
				libc::EINTR => continue,
				e => return Err(ClockError(e))
			}
		}
	}
}
