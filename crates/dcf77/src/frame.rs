//! The DCF77 minute frame.
//!
//! See [DCF77 documentation](https://en.wikipedia.org/wiki/DCF77#Time_code_details) for details.
//! Bit `n` of a [`MinuteFrame`] is sent during second `n` of the minute. BCD fields are sent
//! least significant bit first, so a field's ones digit occupies its low bits.

use core::fmt;
use crate::calendar::{CalendarMoment, DstRules, leap_eligible};

/// Bit 16: DST change at the end of this hour.
const DST_TOGGLE: u64 = 1 << 16;
/// Bit 17: CEST in effect.
const CEST: u64 = 1 << 17;
/// Bit 18: CET in effect.
const CET: u64 = 1 << 18;
/// Bit 19: leap second at the end of this hour.
const LEAP_ANNOUNCE: u64 = 1 << 19;
/// Bit 20: start of encoded time, always set.
const TIME_START: u64 = 1 << 20;
/// Bit 60: out-of-band leap second marker, never transmitted as data.
const LEAP_MARKER: u64 = 1 << 60;

/// Mask of the 61 addressable frame bits.
const FRAME_MASK: u64 = (1 << 61) - 1;

/// Encode `n` (ranged [0, 99]) as two BCD digits, tens in the high nibble.
///
/// # Examples
///
/// ```
/// # use dcf77::bcd;
/// assert_eq!(bcd(0), 0x00);
/// assert_eq!(bcd(9), 0x09);
/// assert_eq!(bcd(45), 0x45);
/// assert_eq!(bcd(99), 0x99);
/// ```
#[inline(always)]
pub const fn bcd(n: u8) -> u8 {
	((n / 10) << 4) | (n % 10)
}

/// Compute the even parity bit for bits `start..=end` of `bits`.
///
/// The result is the XOR of every bit in the range, so appending it makes the number of ones
/// even.
///
/// # Examples
///
/// ```
/// # use dcf77::even_parity;
/// assert!(!even_parity(0b0110, 0, 3));
/// assert!(even_parity(0b0111, 0, 3));
/// assert!(!even_parity(0b0111, 1, 2));
/// ```
#[inline]
pub fn even_parity(bits: u64, start: u8, end: u8) -> bool {
	let width = end - start + 1;
	let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
	((bits >> start) & mask).count_ones() & 1 == 1
}

/// One encoded DCF77 minute.
///
/// Bits 0-58 are transmitted data. Bit 59 is always zero and marks the minute boundary. Bit 60
/// is the out-of-band leap second marker read by [`modulation_for`](crate::modulation_for).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MinuteFrame(u64);

impl MinuteFrame {
	/// Wrap raw frame bits. Bits above 60 are discarded.
	#[inline(always)]
	pub const fn from_bits(bits: u64) -> MinuteFrame {
		MinuteFrame(bits & FRAME_MASK)
	}

	/// The raw frame bits.
	#[inline(always)]
	pub const fn bits(&self) -> u64 {
		self.0
	}

	/// Whether bit `index` is set. Indices past 60 are never set.
	#[inline(always)]
	pub const fn bit(&self, index: u8) -> bool {
		index <= 60 && (self.0 >> index) & 1 == 1
	}

	/// Whether this minute ends with an inserted leap second.
	#[inline(always)]
	pub const fn leap_marker(&self) -> bool {
		self.0 & LEAP_MARKER != 0
	}
}

impl fmt::Display for MinuteFrame {
	/// Render the transmitted bits 0-58 in transmission order, grouped by field.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::MinuteFrame;
	/// let s = MinuteFrame::from_bits(0x090BE631B120000).to_string();
	/// assert_eq!(s, "000000000000000 00100 1000110 1 100011 0 001100 111 11010 00010010 0");
	/// ```
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// Field boundaries: weather, flags, minute, parity, hour, parity, day, weekday, month,
		// year, parity
		const GROUPS: [u8; 11] = [15, 5, 7, 1, 6, 1, 6, 3, 5, 8, 1];
		let mut index = 0;
		for (i, len) in GROUPS.iter().enumerate() {
			if i > 0 {
				f.write_str(" ")?;
			}
			for _ in 0..*len {
				f.write_str(if self.bit(index) { "1" } else { "0" })?;
				index += 1;
			}
		}
		Ok(())
	}
}

/// Builds [`MinuteFrame`]s from calendar moments.
///
/// The encoder owns the DST rules and refreshes their day of month whenever the encoded year
/// changes.
///
/// # Examples
///
/// ```
/// # use dcf77::{CalendarMoment, FrameEncoder};
/// let mut encoder = FrameEncoder::new();
/// // Sunday, March 31, 2024. 01:00 CET, an hour before the switch to CEST.
/// let moment = CalendarMoment::new(24, 3, 31, 7, 1, 0, false).unwrap();
/// let frame = encoder.encode(&moment, false);
/// assert!(frame.bit(16));
/// assert!(frame.bit(20));
/// assert!(!frame.bit(59));
/// assert!(!frame.leap_marker());
/// ```
#[derive(Clone, Debug)]
pub struct FrameEncoder {
	rules: DstRules,
	year: Option<i32>
}

impl FrameEncoder {
	/// Construct an encoder using Central European DST rules.
	pub fn new() -> FrameEncoder {
		FrameEncoder::with_rules(DstRules::CENTRAL_EUROPE)
	}

	/// Construct an encoder using custom DST rules.
	pub fn with_rules(rules: DstRules) -> FrameEncoder {
		FrameEncoder { rules, year: None }
	}

	/// The DST rules as last recomputed.
	pub fn rules(&self) -> &DstRules {
		&self.rules
	}

	/// Encode `moment` into a frame.
	///
	/// `leap_flag` is the time source's leap second indicator. It is announced (bit 19) during hour
	/// 23 and sets the leap marker (bit 60) on 23:59. `moment` is assumed valid, see
	/// [`CalendarMoment::new`].
	pub fn encode(&mut self, moment: &CalendarMoment, leap_flag: bool) -> MinuteFrame {
		let year = moment.full_year();
		if self.year != Some(year) {
			self.rules.recompute(year);
			self.year = Some(year);
		}

		let mut r = TIME_START;
		if self.rules.toggle_flag(moment) {
			r |= DST_TOGGLE;
		}
		r |= if moment.dst { CEST } else { CET };
		if leap_eligible(moment.hour, leap_flag) {
			r |= LEAP_ANNOUNCE;
		}

		r |= (bcd(moment.minute)  as u64 & 0x7f) << 21;
		r |= (bcd(moment.hour)    as u64 & 0x3f) << 29;
		r |= (bcd(moment.day)     as u64 & 0x3f) << 36;
		r |= (moment.weekday      as u64 & 0x07) << 42;
		r |= (bcd(moment.month)   as u64 & 0x1f) << 45;
		r |= (bcd(moment.year)    as u64 & 0xff) << 50;

		r |= (even_parity(r, 21, 27) as u64) << 28;
		r |= (even_parity(r, 29, 34) as u64) << 35;
		r |= (even_parity(r, 36, 57) as u64) << 58;

		if leap_flag && moment.hour == 23 && moment.minute == 59 {
			r |= LEAP_MARKER;
		}

		MinuteFrame(r)
	}
}

impl Default for FrameEncoder {
	fn default() -> Self {
		FrameEncoder::new()
	}
}
