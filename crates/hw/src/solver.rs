//! Loop count and clock divider search for the carrier program.
//!
//! The generator's clock is the reference clock divided by a fractional divider in [1, 65535]
//! with 1/256 resolution. For each loop count the ideal divider is computed and quantized, and
//! the candidate landing closest to the target frequency wins.

use thiserror::Error;

/// Reference clock of the generator.
pub const REFERENCE_HZ: f64 = 200_000_000.0;

/// DCF77 carrier frequency.
pub const TARGET_HZ: f64 = 77_500.0;

/// Smallest loop count searched.
pub const LOOPS_MIN: u32 = 30;

/// Largest loop count searched.
pub const LOOPS_MAX: u32 = 800;

/// Divider register range.
const DIVIDER_MIN: f64 = 1.0;
const DIVIDER_MAX: f64 = 65535.0;

/// Fractional divider steps per unit.
const DIVIDER_STEPS: f64 = 256.0;

/// The chosen generator settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSolution {
	/// Countdown per half period.
	pub loops: u32,
	/// Unquantized divider for `loops`.
	pub ideal_divider: f64,
	/// Divider quantized to 1/256.
	pub divider: f64,
	/// Output frequency with `divider`.
	pub frequency: f64,
	/// Absolute deviation of `frequency` from the target.
	pub error: f64
}

/// The error type for [`solve`].
#[derive(Debug, Error, PartialEq)]
pub enum SolverError {
	/// No loop count in range gives a divider within the register range.
	#[error("no clock divider in [1, 65535] for {target_hz} Hz from {reference_hz} Hz with loops {loops_min}..={loops_max}")]
	NoDivider { reference_hz: f64, target_hz: f64, loops_min: u32, loops_max: u32 }
}

/// Find the loop count and divider that best approximate `target_hz` from `reference_hz`.
///
/// Every loop count in `loops_min..=loops_max` is tried. Ties go to the larger loop count.
///
/// # Errors
///
/// Returns [`SolverError::NoDivider`] if no loop count yields an in-range divider.
///
/// # Examples
///
/// ```
/// # use hw::solve;
/// let s = solve(200e6, 77_500.0, 30, 800).unwrap();
/// assert_eq!(s.loops, 306);
/// assert_eq!(s.divider, 4.17578125);
/// assert!(s.error < 0.5);
/// ```
pub fn solve(reference_hz: f64, target_hz: f64, loops_min: u32, loops_max: u32)
	-> Result<ClockSolution, SolverError>
{
	let mut best: Option<ClockSolution> = None;
	for loops in loops_min..=loops_max {
		let cycles = crate::carrier::program_cycles(loops) as f64;
		let ideal_divider = reference_hz / (target_hz * cycles);
		if !(DIVIDER_MIN..=DIVIDER_MAX).contains(&ideal_divider) {
			continue;
		}

		let divider = (ideal_divider * DIVIDER_STEPS).round() / DIVIDER_STEPS;
		let frequency = reference_hz / (divider * cycles);
		let error = (frequency - target_hz).abs();
		if best.is_none_or(|b| error <= b.error) {
			best = Some(ClockSolution { loops, ideal_divider, divider, frequency, error });
		}
	}

	best.ok_or(SolverError::NoDivider { reference_hz, target_hz, loops_min, loops_max })
}
