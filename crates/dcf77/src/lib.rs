//! Encode the DCF77 time signal.
//!
//! This crate turns a Central European civil minute into the 61-bit DCF77 minute frame and maps
//! each second of that frame onto an amplitude modulation step. It performs no I/O and keeps no
//! global state; everything the encoder needs lives in values owned by the caller.
//!
//! The pipeline runs leaf first:
//! - [`zone`] converts a Unix timestamp to Europe/Berlin civil time (CET / CEST).
//! - [`calendar`] computes weekdays, last-Sunday transition dates, and the DST and leap second
//!   announcement flags.
//! - [`frame`] packs a [`CalendarMoment`] into a [`MinuteFrame`] with BCD fields and even parity.
//! - [`modulation`] decides the carrier state and pulse width for each second of the frame.
//!
//! See [DCF77 documentation](https://en.wikipedia.org/wiki/DCF77#Time_code_details) for details
//! on the time code.
//!
//! # Examples
//!
//! ```
//! # use dcf77::{zone, CalendarMoment, FrameEncoder, modulation_for, CarrierState};
//! // Sunday, May 26, 2024. 16:58:00 UTC / 18:58 CEST.
//! let local = zone::berlin(1716742680).unwrap();
//! let moment = CalendarMoment::from_local(&local);
//!
//! let mut encoder = FrameEncoder::new();
//! let frame = encoder.encode(&moment, false);
//! assert_eq!(frame.bits(), 0x090BE631B120000);
//!
//! // Second 20 always carries a one bit: a 200ms reduced carrier pulse
//! let m = modulation_for(20, &frame);
//! assert_eq!(m.state, CarrierState::Reduced);
//! assert_eq!(m.active_ms, 200);
//! ```

pub mod calendar;
pub mod frame;
pub mod modulation;
pub mod zone;

pub use calendar::{CalendarMoment, DstRule, DstRules, MomentError, last_sunday, leap_eligible, weekday};
pub use frame::{FrameEncoder, MinuteFrame, bcd, even_parity};
pub use modulation::{CarrierState, Modulation, modulation_for};
pub use zone::LocalTime;
