//! Per-second amplitude modulation.
//!
//! A `1` bit reduces the carrier for the first 200 ms of its second. A `0` bit keeps the carrier
//! at full amplitude for the whole second: its 100 ms edge returns to full amplitude from full
//! amplitude and changes nothing on air. Receivers therefore see no second mark during zero bits
//! and decode them only by their position relative to the minute gap, which makes them less
//! tolerant of a noisy signal than with real DCF77.
//!
//! Second 59 is left unmodulated so receivers can find the minute boundary, unless a leap second
//! is inserted, in which case second 59 gets a 100 ms reduction and the added second 60 is the
//! unmodulated one.

use crate::frame::MinuteFrame;

/// The carrier amplitude for the active part of a second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarrierState {
	/// Full amplitude. The output line is driven low.
	Full,
	/// Reduced amplitude. The output line is released.
	Reduced
}

/// How one second is transmitted.
///
/// The carrier is set to `state` at the start of the second and returned to
/// [`CarrierState::Full`] after `active_ms` milliseconds. An `active_ms` of zero means the second
/// has no second edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Modulation {
	/// Carrier state at the start of the second.
	pub state: CarrierState,
	/// Milliseconds until the carrier returns to full amplitude.
	pub active_ms: u32
}

impl Modulation {
	const fn new(state: CarrierState, active_ms: u32) -> Modulation {
		Modulation { state, active_ms }
	}
}

/// Get the modulation for `second` (ranged [0, 59]) of the minute encoded by `frame`.
///
/// # Examples
///
/// ```
/// # use dcf77::{CarrierState, MinuteFrame, Modulation, modulation_for};
/// let frame = MinuteFrame::from_bits(1 << 20);
/// assert_eq!(modulation_for(20, &frame), Modulation { state: CarrierState::Reduced, active_ms: 200 });
/// assert_eq!(modulation_for(59, &frame), Modulation { state: CarrierState::Full, active_ms: 0 });
/// // A zero bit never leaves full carrier
/// assert_eq!(modulation_for(0, &frame).state, CarrierState::Full);
/// ```
pub fn modulation_for(second: u8, frame: &MinuteFrame) -> Modulation {
	if second == 59 && frame.leap_marker() {
		Modulation::new(CarrierState::Reduced, 100)
	} else if second > 58 {
		Modulation::new(CarrierState::Full, 0)
	} else if frame.bit(second) {
		Modulation::new(CarrierState::Reduced, 200)
	} else {
		Modulation::new(CarrierState::Full, 100)
	}
}
