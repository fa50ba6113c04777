//! Utilities for dealing with time (UTC and Unix timestamps), unaware of timezone.
//!
//! This module provides [`TimeSpec`] arithmetic used to build absolute deadlines, and calendar
//! utilities to convert between Unix time and the Gregorian calendar. The calendar functions do
//! not rely on libc's `gmtime`, so they are thread safe and identical on every host.
//!
//! # Examples
//!
//! ```
//! # use time::time::{Milliseconds, Seconds, TimeSpec};
//! // The instant 200ms after the third second of a minute
//! let minute = TimeSpec { sec: 1716742680, nsec: 0 };
//! let edge = minute + Seconds(3) + Milliseconds(200);
//! assert_eq!(edge, TimeSpec { sec: 1716742683, nsec: 200000000 });
//! ```

use core::ops::{Add, AddAssign};
#[cfg(feature = "now")]
use core::mem::MaybeUninit;
#[cfg(feature = "now")]
use libc::{timespec, clock_gettime, CLOCK_REALTIME};

/// Nanoseconds per second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
/// Nanoseconds per millisecond.
const NANOS_PER_MILLI: i64 = 1_000_000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds per hour.
pub const SECONDS_PER_HOUR: i64 = SECONDS_PER_MINUTE * 60;
/// Seconds per day.
pub const SECONDS_PER_DAY: i64 = SECONDS_PER_HOUR * 24;
/// Days in one 400-year Gregorian cycle.
const DAYS_PER_ERA: i64 = 146097;
/// Days from 0000-03-01 (start of the rotated calendar) to 1970-01-01.
const DAYS_FROM_MARCH_0000_TO_JAN_1970: i64 = 719468;
/// Years to add to [`Tm::year`][Tm#structfield.year] to get absolute Gregorian calendar year.
pub const YEAR_ADJUST: i64 = 1900;

/// Helper type to support math on [`TimeSpec`]s. Represents seconds.
#[repr(transparent)]
pub struct Seconds(pub i64);

/// Helper type to support math on [`TimeSpec`]s. Represents milliseconds.
///
/// Adding milliseconds to a [`TimeSpec`] rolls over seconds if needed.
#[repr(transparent)]
pub struct Milliseconds(pub i64);

/// Helper type to support math on [`TimeSpec`]s. Represents nanoseconds.
///
/// # Examples
///
/// ```
/// # use time::time::{Nanoseconds, TimeSpec};
/// let mut c = TimeSpec { sec: 1735732800, nsec: 999999999 };
/// assert_eq!(c + Nanoseconds(10), TimeSpec { sec: 1735732801, nsec: 9 });
/// ```
#[repr(transparent)]
pub struct Nanoseconds(pub i64);

/// Unix time with nanosecond granularity.
///
/// Supports addition / addition-assignment with [`Seconds`], [`Milliseconds`] and
/// [`Nanoseconds`]. Subtraction is supported by adding negative values. Ordering compares `sec`
/// first, then `nsec`, which is correct as long as `nsec` stays normalized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSpec {
	/// Seconds since the Unix epoch
	pub sec: i64,
	/// Nanoseconds since the beginning of `sec`, ranging [0-999999999]
	pub nsec: i64
}

impl TimeSpec {
	/// The instant at the start of second `sec`.
	#[inline(always)]
	pub const fn at(sec: i64) -> TimeSpec {
		TimeSpec { sec, nsec: 0 }
	}
}

#[cfg(feature = "now")]
impl From<timespec> for TimeSpec {
	/// Convert from `libc::timespec` to [`TimeSpec`] for better math ergonomics
	fn from(value: timespec) -> Self {
		TimeSpec {
			sec: value.tv_sec as i64,
			nsec: value.tv_nsec as i64
		}
	}
}

impl Add<Seconds> for TimeSpec {
	type Output = Self;

	fn add(mut self, rhs: Seconds) -> Self::Output {
		self.sec += rhs.0;
		self
	}
}

impl AddAssign<Seconds> for TimeSpec {
	fn add_assign(&mut self, rhs: Seconds) {
		*self = *self + rhs;
	}
}

impl Add<Nanoseconds> for TimeSpec {
	type Output = Self;

	/// Add `rhs` nanoseconds to `self`, rolling over seconds as needed to ensure `nsec` stays in
	/// the range of [0-999999999].
	fn add(mut self, rhs: Nanoseconds) -> Self::Output {
		let nsec = self.nsec + rhs.0;
		self.sec += nsec.div_euclid(NANOS_PER_SECOND);
		self.nsec = nsec.rem_euclid(NANOS_PER_SECOND);
		self
	}
}

impl AddAssign<Nanoseconds> for TimeSpec {
	fn add_assign(&mut self, rhs: Nanoseconds) {
		*self = *self + rhs;
	}
}

impl Add<Milliseconds> for TimeSpec {
	type Output = Self;

	fn add(self, rhs: Milliseconds) -> Self::Output {
		self + Nanoseconds(rhs.0 * NANOS_PER_MILLI)
	}
}

impl AddAssign<Milliseconds> for TimeSpec {
	fn add_assign(&mut self, rhs: Milliseconds) {
		*self = *self + rhs;
	}
}

/// Get the current time as a Unix timestamp with nanosecond granularity.
///
/// This function will return `None` if `libc::clock_gettime` fails.
///
/// This function is thread safe.
#[cfg(feature = "now")]
pub fn now() -> Option<TimeSpec> {
	let mut time = MaybeUninit::<timespec>::uninit();
	// Safety:
	// - clock_gettime does not read time, only writes
	// - if clock_gettime returns zero, time is successfully initialized
	unsafe {
		match clock_gettime(CLOCK_REALTIME, time.as_mut_ptr()) {
			0 => Some(time.assume_init().into()),
			_ => None
		}
	}
}

/// Check whether a given `year` is a leap year.
///
/// Year must be the absolute Gregorian calendar year (i.e. 2024).
///
/// # Examples
///
/// ```
/// # use time::time::isleapyear;
/// assert_eq!(isleapyear(1900), false);
/// assert_eq!(isleapyear(2000), true);
/// assert_eq!(isleapyear(2023), false);
/// assert_eq!(isleapyear(2024), true);
/// ```
#[inline(always)]
pub fn isleapyear(year: i32) -> bool {
	year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// The number of days in a given month.
///
/// `y` must be the absolute Gregorian calendar year, and `m` the 1-indexed month starting at
/// January. Months outside [1, 12] have zero days.
pub fn days_per_month(y: i32, m: u8) -> u8 {
	const DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
	match m {
		2 if isleapyear(y) => 29,
		1..=12 => DAYS[m as usize - 1],
		_ => 0
	}
}

/// Get the Unix timestamp for 00:00:00 UTC on a given year, month, and day.
///
/// `y` must be the absolute Gregorian calendar year, `m` the 1-indexed month starting at January,
/// and `d` the day of the month.
///
/// # Examples
///
/// ```
/// # use time::time::timestamp_from_ymd;
/// assert_eq!(timestamp_from_ymd(2024, 2, 29), 1709164800);
/// assert_eq!(timestamp_from_ymd(2024, 3, 31), 1711843200);
/// ```
pub fn timestamp_from_ymd(y: i32, m: u8, d: u8) -> i64 {
	// Rotate the year to start in March so the leap day is the last day of the year.
	// http://howardhinnant.github.io/date_algorithms.html#days_from_civil
	let y = if m < 3 { y as i64 - 1 } else { y as i64 };
	let era = y.div_euclid(400);
	let yoe = y - era * 400;
	let mp = (m as i64 + 9) % 12;
	let doy = (153 * mp + 2) / 5 + d as i64 - 1;
	let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
	SECONDS_PER_DAY * (era * DAYS_PER_ERA + doe - DAYS_FROM_MARCH_0000_TO_JAN_1970)
}

/// Gregorian calendar date in UTC, close to [`libc::tm`] with some small differences.
///
/// Key differences:
/// - `mon` is [0, 11] in `libc::tm` but [1, 12] in [`Tm`].
/// - there is no day-of-year field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tm {
	/// Seconds, ranged [0, 59]
	pub sec: u8,
	/// Minutes, ranged [0, 59]
	pub min: u8,
	/// Hours, ranged [0, 23]
	pub hour: u8,
	/// Day of the month, ranged [1, 31]
	pub day: u8,
	/// Month of the year, ranged [1, 12]
	pub mon: u8,
	/// Years since 1900, ranged [0, 255] => [1900, 2155]
	pub year: u8,
	/// Day of the week, ranged [0, 6] => [Sunday, Saturday]
	pub wday: u8
}

impl Tm {
	/// Convert a Unix timestamp into a calendar date.
	///
	/// Returns `None` for timestamps before the Unix epoch (Jan 1, 1970) or after the year 2155.
	pub fn new(unixtimestamp: i64) -> Option<Tm> {
		// Inverse of timestamp_from_ymd, working in 400 year eras of the March-based calendar.
		// http://howardhinnant.github.io/date_algorithms.html#civil_from_days
		if unixtimestamp < 0 { return None }
		let days = unixtimestamp / SECONDS_PER_DAY;
		let rem = unixtimestamp % SECONDS_PER_DAY;
		let z = days + DAYS_FROM_MARCH_0000_TO_JAN_1970;
		let era = z / DAYS_PER_ERA;
		let doe = z % DAYS_PER_ERA;
		let yoe = (doe - doe / 1460 + doe / 36524 - doe / (DAYS_PER_ERA - 1)) / 365;
		let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
		let mp = (5 * doy + 2) / 153;
		let day = doy - (153 * mp + 2) / 5 + 1;
		let mon = if mp < 10 { mp + 3 } else { mp - 9 };
		let year = yoe + era * 400 + if mon <= 2 { 1 } else { 0 };
		let year = u8::try_from(year - YEAR_ADJUST).ok()?;

		Some(Tm {
			sec: (rem % SECONDS_PER_MINUTE) as u8,
			min: (rem % SECONDS_PER_HOUR / SECONDS_PER_MINUTE) as u8,
			hour: (rem / SECONDS_PER_HOUR) as u8,
			day: day as u8,
			mon: mon as u8,
			year,
			wday: ((days + 4) % 7) as u8 // Jan 1, 1970 was a Thursday
		})
	}

	/// Get the absolute Gregorian calendar year.
	#[inline(always)]
	pub fn year(&self) -> i32 {
		self.year as i32 + YEAR_ADJUST as i32
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::mem::MaybeUninit;
	use libc::{time_t, tm};

	// Get the libc version of UTC calendar time
	fn utc_time(time: time_t) -> tm {
		unsafe {
			let mut utc = MaybeUninit::<tm>::uninit();
			libc::gmtime_r(&time, utc.as_mut_ptr());
			utc.assume_init()
		}
	}

	fn compare_dates(time: i64) {
		let d1 = utc_time(time as time_t);
		let d2 = Tm::new(time).unwrap();
		assert_eq!(d1.tm_sec, d2.sec as i32, "time: {}", time);
		assert_eq!(d1.tm_min, d2.min as i32, "time: {}", time);
		assert_eq!(d1.tm_hour, d2.hour as i32, "time: {}", time);
		assert_eq!(d1.tm_mday, d2.day as i32, "time: {}", time);
		assert_eq!(d1.tm_mon + 1, d2.mon as i32, "time: {}", time);
		assert_eq!(d1.tm_year, d2.year as i32, "time: {}", time);
		assert_eq!(d1.tm_wday, d2.wday as i32, "time: {}", time);
	}

	#[test]
	fn date_test() {
		assert!(Tm::new(-94694400).is_none());
		compare_dates(0);
		compare_dates(5097600);
		compare_dates(951782400); // Feb 29, 2000
		compare_dates(1483228799); // Dec 31, 2016 23:59:59
		compare_dates(1711845583);
		compare_dates(1718617807);
		compare_dates(1844848207);
		compare_dates(4102444799); // Dec 31, 2099 23:59:59

		assert!(Tm::new(i64::MAX).is_none());
	}

	#[test]
	fn timestamp_from_ymd_test() {
		assert_eq!(timestamp_from_ymd(1970, 1, 1), 0);
		assert_eq!(timestamp_from_ymd(2000, 3, 1), 951868800);
		assert_eq!(timestamp_from_ymd(2024, 2, 28), 1709078400);
		assert_eq!(timestamp_from_ymd(2024, 3, 1), 1709251200);
		assert_eq!(timestamp_from_ymd(2024, 10, 27), 1729987200);

		for t in [0, 86400 * 59, 951782400, 1711843200, 4102358400] {
			let tm = Tm::new(t).unwrap();
			assert_eq!(timestamp_from_ymd(tm.year(), tm.mon, tm.day), t);
		}
	}

	#[test]
	fn days_per_month_test() {
		assert_eq!(days_per_month(2023, 2), 28);
		assert_eq!(days_per_month(2024, 2), 29);
		assert_eq!(days_per_month(2100, 2), 28);
		assert_eq!(days_per_month(2000, 2), 29);
		assert_eq!(days_per_month(2024, 4), 30);
		assert_eq!(days_per_month(2024, 12), 31);
		assert_eq!(days_per_month(2024, 0), 0);
		assert_eq!(days_per_month(2024, 13), 0);
	}

	#[test]
	fn timespec_math_test() {
		let t = TimeSpec::at(100);
		assert_eq!(t + Milliseconds(200), TimeSpec { sec: 100, nsec: 200000000 });
		assert_eq!(t + Milliseconds(1500), TimeSpec { sec: 101, nsec: 500000000 });
		assert_eq!(t + Nanoseconds(-1), TimeSpec { sec: 99, nsec: 999999999 });
		assert_eq!(t + Seconds(-10), TimeSpec::at(90));

		let mut u = t;
		u += Milliseconds(999);
		u += Milliseconds(1);
		assert_eq!(u, TimeSpec::at(101));
		assert!(t < t + Nanoseconds(1));
		assert!(TimeSpec { sec: 99, nsec: 999999999 } < t);
	}
}
