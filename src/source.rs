//! Where the transmitted time comes from.
//!
//! A [`TimeSource`] is queried once at startup. The transmission loop then paces seconds with the
//! local clock, so a network reference only decides which minute is encoded and whether a leap
//! second is pending.

use time::Clock;
use tracing::{info, warn};
use crate::error::Error;

/// Largest tolerated difference between a remote reference and the local clock, in seconds.
const MAX_OFFSET: i64 = 1;

/// A reference time and leap second announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeReference {
	/// Seconds since the Unix epoch.
	pub sec: i64,
	/// Whether a leap second is pending.
	pub leap: bool
}

/// A provider of the reference time.
pub trait TimeSource {
	/// Get the current reference time.
	///
	/// # Errors
	///
	/// Returns an error rather than a default time if the source cannot be read.
	fn reference(&self) -> Result<TimeReference, Error>;
}

/// The local system clock. Never announces a leap second.
#[derive(Clone, Debug)]
pub struct LocalSource<C> {
	clock: C
}

impl<C: Clock> LocalSource<C> {
	pub fn new(clock: C) -> LocalSource<C> {
		LocalSource { clock }
	}
}

impl<C: Clock> TimeSource for LocalSource<C> {
	fn reference(&self) -> Result<TimeReference, Error> {
		let now = self.clock.now().ok_or(Error::ClockUnavailable)?;
		info!(sec = now.sec, "using local clock");
		Ok(TimeReference { sec: now.sec, leap: false })
	}
}

/// An NTP server, compared against the local clock `C`.
#[derive(Clone, Debug)]
pub struct NtpSource<C> {
	server: String,
	clock: C
}

impl<C: Clock> NtpSource<C> {
	pub fn new(server: impl Into<String>, clock: C) -> NtpSource<C> {
		NtpSource { server: server.into(), clock }
	}
}

impl<C: Clock> TimeSource for NtpSource<C> {
	fn reference(&self) -> Result<TimeReference, Error> {
		let ntp = sntp::query(&self.server)?;
		let local = self.clock.now().ok_or(Error::ClockUnavailable)?;
		let offset = ntp.sec - local.sec;
		if offset.abs() > MAX_OFFSET {
			warn!(server = %self.server, offset, "local clock disagrees with NTP, seconds will be paced off by the offset");
		}
		info!(server = %self.server, sec = ntp.sec, leap = ntp.leap, offset, "using NTP time");
		Ok(TimeReference { sec: ntp.sec, leap: ntp.leap != 0 })
	}
}
