//! Europe/Berlin civil time.
//!
//! DCF77 always broadcasts German legal time, independent of where the transmitter runs, so the
//! conversion is fixed here instead of relying on the host timezone database. CET is UTC+1 and
//! CEST is UTC+2. Both transitions happen at 01:00 UTC on the last Sunday of the month.

use time::{SECONDS_PER_HOUR, Tm, timestamp_from_ymd};
use crate::calendar::{DstRule, DstRules, last_sunday};

/// A civil time in Europe/Berlin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTime {
	/// Calendar breakdown of the local time.
	pub tm: Tm,
	/// Whether CEST is in effect.
	pub dst: bool
}

/// The UTC instant of a transition rule in `year`, given the UTC offset in force before it.
fn transition(rule: &DstRule, year: i32, offset_hours: i64) -> i64 {
	timestamp_from_ymd(year, rule.month, last_sunday(year, rule.month))
		+ (rule.hour as i64 - offset_hours) * SECONDS_PER_HOUR
}

/// Whether CEST is in effect at the Unix timestamp `unix`.
///
/// Returns `None` if `unix` is outside the range supported by [`Tm`].
pub fn is_summer_time(unix: i64) -> Option<bool> {
	let year = Tm::new(unix)?.year();
	let rules = DstRules::CENTRAL_EUROPE;
	let start = transition(&rules.spring, year, 1);
	let end = transition(&rules.fall, year, 2);
	Some(start <= unix && unix < end)
}

/// Convert the Unix timestamp `unix` to Europe/Berlin civil time.
///
/// Returns `None` for timestamps before the Unix epoch or past the range of [`Tm`].
///
/// # Examples
///
/// ```
/// # use dcf77::zone::berlin;
/// // 2024-03-31 00:59:59 UTC is still CET, one second later is CEST
/// let before = berlin(1711846799).unwrap();
/// assert_eq!((before.tm.hour, before.tm.min, before.dst), (1, 59, false));
/// let after = berlin(1711846800).unwrap();
/// assert_eq!((after.tm.hour, after.tm.min, after.dst), (3, 0, true));
/// ```
pub fn berlin(unix: i64) -> Option<LocalTime> {
	let dst = is_summer_time(unix)?;
	let offset = if dst { 2 } else { 1 } * SECONDS_PER_HOUR;
	Some(LocalTime { tm: Tm::new(unix + offset)?, dst })
}
