//! Calendar arithmetic for the DCF77 announcement bits.
//!
//! Central European daylight saving time starts on the last Sunday of March at 02:00 local time
//! and ends on the last Sunday of October at 03:00 local time. DCF77 announces each change
//! during the hour before it happens (bit 16), which requires knowing the transition dates for
//! the year being encoded. This module computes them with closed-form weekday arithmetic, no
//! calendar tables.

use thiserror::Error;
use time::days_per_month;
use crate::zone::LocalTime;

/// Get the weekday (0-6 => Sunday-Saturday) for a given year, month, and day.
///
/// `year` must be the absolute Gregorian calendar year, `month` the 1-indexed month starting at
/// January, and `day` the day of the month. Uses Sakamoto's method.
///
/// # Examples
///
/// ```
/// # use dcf77::weekday;
/// assert_eq!(weekday(2024, 1, 1), 1);   // Monday
/// assert_eq!(weekday(2024, 2, 29), 4);  // Thursday
/// assert_eq!(weekday(2024, 3, 31), 0);  // Sunday
/// ```
pub fn weekday(year: i32, month: u8, day: u8) -> u8 {
	const OFFSETS: [i32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
	let y = if month < 3 { year - 1 } else { year };
	let t = OFFSETS[(month.clamp(1, 12) - 1) as usize];
	(y + y.div_euclid(4) - y.div_euclid(100) + y.div_euclid(400) + t + day as i32).rem_euclid(7) as u8
}

/// Get the day of month of the last Sunday in `month` of `year`.
///
/// # Examples
///
/// ```
/// # use dcf77::last_sunday;
/// assert_eq!(last_sunday(2024, 3), 31);
/// assert_eq!(last_sunday(2024, 10), 27);
/// assert_eq!(last_sunday(2025, 3), 30);
/// ```
pub fn last_sunday(year: i32, month: u8) -> u8 {
	let last = days_per_month(year, month);
	last - weekday(year, month, last)
}

/// Whether a leap second announcement applies to `hour`.
///
/// Leap seconds are announced only during the last hour of the day, and only when the time
/// source has signalled one.
#[inline(always)]
pub fn leap_eligible(hour: u8, leap_source_active: bool) -> bool {
	leap_source_active && hour == 23
}

/// A daylight saving transition rule.
///
/// `month`, `week`, `weekday` and `hour` are fixed policy. The day of month the rule falls on
/// changes every year and is refreshed by [`DstRule::recompute`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DstRule {
	/// Month of the transition, ranged [1, 12].
	pub month: u8,
	/// Week ordinal within the month, ranged [1, 5]. `5` means the last week.
	pub week: u8,
	/// Day of the week of the transition, ranged [0, 6] => [Sunday, Saturday].
	pub weekday: u8,
	/// Local hour at which the transition happens.
	pub hour: u8,
	/// Computed day of month for the last recomputed year. Zero until first computed.
	day: u8
}

impl DstRule {
	/// Construct a rule. The day of month stays unset until [`DstRule::recompute`].
	pub const fn new(month: u8, week: u8, weekday: u8, hour: u8) -> DstRule {
		DstRule { month, week, weekday, hour, day: 0 }
	}

	/// Day of month this rule falls on for the last recomputed year.
	#[inline(always)]
	pub fn day(&self) -> u8 {
		self.day
	}

	/// Compute the day of month of this rule for `year`, without updating `self`.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::DstRule;
	/// // Second Sunday of March (US rule)
	/// assert_eq!(DstRule::new(3, 2, 0, 2).day_in(2024), 10);
	/// // Last Sunday of October
	/// assert_eq!(DstRule::new(10, 5, 0, 3).day_in(2024), 27);
	/// ```
	pub fn day_in(&self, year: i32) -> u8 {
		if self.week >= 5 && self.weekday == 0 {
			return last_sunday(year, self.month);
		}

		let len = days_per_month(year, self.month);
		let first = 1 + (7 + self.weekday - weekday(year, self.month, 1)) % 7;
		let mut day = first + 7 * (self.week.max(1) - 1);
		while day > len {
			day -= 7;
		}
		day
	}

	/// Refresh [`DstRule::day`] for `year`.
	pub fn recompute(&mut self, year: i32) {
		self.day = self.day_in(year);
	}

	/// Whether `moment` falls in the hour before this rule's transition.
	fn precedes(&self, moment: &CalendarMoment) -> bool {
		moment.month == self.month && moment.day == self.day && moment.hour + 1 == self.hour
	}
}

/// The spring-forward and fall-back rules of one timezone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DstRules {
	/// Start of daylight saving time.
	pub spring: DstRule,
	/// End of daylight saving time.
	pub fall: DstRule
}

impl DstRules {
	/// European Union rules (CET-1CEST,M3.5.0/2,M10.5.0/3): last Sunday of March at 02:00, last
	/// Sunday of October at 03:00.
	pub const CENTRAL_EUROPE: DstRules = DstRules {
		spring: DstRule::new(3, 5, 0, 2),
		fall: DstRule::new(10, 5, 0, 3)
	};

	/// Refresh both rules for the absolute Gregorian `year`.
	pub fn recompute(&mut self, year: i32) {
		self.spring.recompute(year);
		self.fall.recompute(year);
	}

	/// Whether a DST change happens at the end of `moment`'s hour (DCF77 bit 16).
	///
	/// Uses the day of month from the last [`DstRules::recompute`]; call it for `moment`'s year
	/// first.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::{CalendarMoment, DstRules};
	/// let mut rules = DstRules::CENTRAL_EUROPE;
	/// rules.recompute(2024);
	/// let before = CalendarMoment::new(24, 3, 31, 7, 1, 30, false).unwrap();
	/// let after = CalendarMoment::new(24, 3, 31, 7, 3, 30, true).unwrap();
	/// assert!(rules.toggle_flag(&before));
	/// assert!(!rules.toggle_flag(&after));
	/// ```
	pub fn toggle_flag(&self, moment: &CalendarMoment) -> bool {
		self.spring.precedes(moment) || self.fall.precedes(moment)
	}
}

impl Default for DstRules {
	fn default() -> Self {
		DstRules::CENTRAL_EUROPE
	}
}

/// The error type for constructing a [`CalendarMoment`].
#[derive(Debug, Error, PartialEq)]
pub enum MomentError {
	/// A field was outside its valid range. The field name and value are provided.
	#[error("{field} out of range: {value}")]
	OutOfRange { field: &'static str, value: u8 },
	/// The day does not exist in the given month, e.g. February 30.
	#[error("day {day} does not exist in month {month} of year {year}")]
	NoSuchDay { year: u8, month: u8, day: u8 }
}

/// One civil minute in DCF77 conventions.
///
/// Unlike [`time::Tm`], the year is relative to the century, months and weekdays are 1-based,
/// and Sunday is 7. Values are validated by [`CalendarMoment::new`]; the frame encoder relies on
/// them being in range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalendarMoment {
	/// Year within the century, ranged [0, 99].
	pub year: u8,
	/// Month, ranged [1, 12].
	pub month: u8,
	/// Day of month, ranged [1, 31].
	pub day: u8,
	/// Day of week, ranged [1, 7] => [Monday, Sunday].
	pub weekday: u8,
	/// Hour, ranged [0, 23].
	pub hour: u8,
	/// Minute, ranged [0, 59].
	pub minute: u8,
	/// Whether summer time (CEST) is in effect.
	pub dst: bool
}

impl CalendarMoment {
	/// Construct a validated moment.
	///
	/// # Errors
	///
	/// Returns [`MomentError::OutOfRange`] for any field outside its range, and
	/// [`MomentError::NoSuchDay`] if `day` is past the end of the month (years are taken to be in
	/// 2000-2099).
	pub fn new(year: u8, month: u8, day: u8, weekday: u8, hour: u8, minute: u8, dst: bool)
		-> Result<CalendarMoment, MomentError>
	{
		let check = |field, value: u8, min, max| {
			if value < min || value > max {
				Err(MomentError::OutOfRange { field, value })
			} else {
				Ok(())
			}
		};
		check("year", year, 0, 99)?;
		check("month", month, 1, 12)?;
		check("day", day, 1, 31)?;
		check("weekday", weekday, 1, 7)?;
		check("hour", hour, 0, 23)?;
		check("minute", minute, 0, 59)?;
		if day > days_per_month(2000 + year as i32, month) {
			return Err(MomentError::NoSuchDay { year, month, day });
		}

		Ok(CalendarMoment { year, month, day, weekday, hour, minute, dst })
	}

	/// Convert a local civil time into DCF77 conventions.
	///
	/// Seconds are dropped, the year is reduced to the century, and Sunday (`wday == 0`) becomes 7.
	pub fn from_local(local: &LocalTime) -> CalendarMoment {
		let tm = &local.tm;
		CalendarMoment {
			year: (tm.year() % 100) as u8,
			month: tm.mon,
			day: tm.day,
			weekday: if tm.wday == 0 { 7 } else { tm.wday },
			hour: tm.hour,
			minute: tm.min,
			dst: local.dst
		}
	}

	/// The absolute Gregorian year, assuming the 21st century.
	#[inline(always)]
	pub fn full_year(&self) -> i32 {
		2000 + self.year as i32
	}
}
