//! The 77.5 kHz carrier generator.
//!
//! The carrier is a square wave from a tiny state machine program: set the pin high, count down
//! `loops`, set it low, count down again. Each half period costs `loops + 3` cycles, so the
//! output frequency is `f_reference / (divider * 2 * (loops + 3))`. [`SysfsPwmCarrier`]
//! reproduces that waveform with a hardware PWM channel.

use std::{fs, io, path::PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use crate::wait_for_node;

/// Default sysfs PWM chip.
pub const DEFAULT_PWM_CHIP: &str = "/sys/class/pwm/pwmchip0";

/// Default PWM channel (GPIO 18 on the Raspberry Pi 5).
pub const DEFAULT_PWM_CHANNEL: u32 = 2;

/// The square wave program, one wrap-around loop of six instructions.
///
/// The loop count is preloaded into `ISR` before the program starts.
pub const CARRIER_PROGRAM: [u16; 6] = [
	0xe001, // set pins, 1
	0xa026, // mov x, isr
	0x0042, // jmp x--, 2
	0xe000, // set pins, 0
	0xa026, // mov x, isr
	0x0045  // jmp x--, 5
];

/// Clock cycles per carrier period of [`CARRIER_PROGRAM`] for a given loop count.
///
/// Computed in `u64` so every `u32` loop count is representable.
///
/// # Examples
///
/// ```
/// # use hw::program_cycles;
/// assert_eq!(program_cycles(30), 66);
/// assert_eq!(program_cycles(306), 618);
/// ```
#[inline(always)]
pub const fn program_cycles(loops: u32) -> u64 {
	2 * (loops as u64 + 3)
}

/// The error type for carrier generator operations.
#[derive(Debug, Error)]
pub enum CarrierError {
	/// The channel could not be exported.
	#[error("failed to export PWM channel {channel} via {path}: {source}")]
	Export { channel: u32, path: PathBuf, source: io::Error },
	/// The exported channel never appeared in sysfs.
	#[error("PWM channel {channel} did not appear at {path}")]
	NotExported { channel: u32, path: PathBuf },
	/// A sysfs attribute write failed.
	#[error("failed to write {path}: {source}")]
	Write { path: PathBuf, source: io::Error },
	/// The loop count and divider do not describe a realizable period.
	#[error("invalid carrier settings: loops {loops}, divider {divider}")]
	InvalidSettings { loops: u32, divider: f64 },
	/// The generator was enabled before [`CarrierGenerator::configure`].
	#[error("carrier is not configured")]
	NotConfigured
}

/// A programmable square wave generator.
pub trait CarrierGenerator: Send {
	/// Claim the generator and load the square wave for `loops` and clock `divider`.
	fn configure(&mut self, loops: u32, divider: f64) -> Result<(), CarrierError>;

	/// Start continuous output.
	fn enable(&mut self) -> Result<(), CarrierError>;

	/// Stop output.
	fn disable(&mut self) -> Result<(), CarrierError>;

	/// Stop output and give up the generator. Releasing an unclaimed generator is a no-op.
	fn release(&mut self) -> Result<(), CarrierError>;
}

impl<T: CarrierGenerator + ?Sized> CarrierGenerator for Box<T> {
	fn configure(&mut self, loops: u32, divider: f64) -> Result<(), CarrierError> {
		(**self).configure(loops, divider)
	}

	fn enable(&mut self) -> Result<(), CarrierError> {
		(**self).enable()
	}

	fn disable(&mut self) -> Result<(), CarrierError> {
		(**self).disable()
	}

	fn release(&mut self) -> Result<(), CarrierError> {
		(**self).release()
	}
}

/// Carrier period in nanoseconds for `loops` and `divider` at `reference_hz`.
///
/// Returns `None` if the settings do not give a positive period that fits in `u64`.
///
/// # Examples
///
/// ```
/// # use hw::carrier::period_ns;
/// // 77.5 kHz is a 12903 ns period
/// assert_eq!(period_ns(306, 4.17578125, 200e6), Some(12903));
/// assert_eq!(period_ns(306, 0.0, 200e6), None);
/// ```
pub fn period_ns(loops: u32, divider: f64, reference_hz: f64) -> Option<u64> {
	let period = (1e9 * divider * program_cycles(loops) as f64 / reference_hz).round();
	if period.is_finite() && period >= 1.0 && period < u64::MAX as f64 {
		Some(period as u64)
	} else {
		None
	}
}

/// A carrier generated by a Linux sysfs PWM channel at 50% duty.
#[derive(Debug)]
pub struct SysfsPwmCarrier {
	chip: PathBuf,
	channel: u32,
	reference_hz: f64,
	configured: bool,
	exported_here: bool
}

impl SysfsPwmCarrier {
	/// Construct a driver for `channel` of the sysfs PWM `chip`, with divider settings interpreted
	/// against `reference_hz`. Nothing is touched until [`CarrierGenerator::configure`].
	pub fn new(chip: impl Into<PathBuf>, channel: u32, reference_hz: f64) -> SysfsPwmCarrier {
		SysfsPwmCarrier { chip: chip.into(), channel, reference_hz, configured: false, exported_here: false }
	}

	fn node(&self) -> PathBuf {
		self.chip.join(format!("pwm{}", self.channel))
	}

	fn write(&self, attr: &str, value: &str) -> Result<(), CarrierError> {
		let path = self.node().join(attr);
		fs::write(&path, value).map_err(|source| CarrierError::Write { path, source })
	}
}

impl CarrierGenerator for SysfsPwmCarrier {
	fn configure(&mut self, loops: u32, divider: f64) -> Result<(), CarrierError> {
		let period = period_ns(loops, divider, self.reference_hz)
			.ok_or(CarrierError::InvalidSettings { loops, divider })?;

		let node = self.node();
		if !node.exists() {
			let path = self.chip.join("export");
			fs::write(&path, self.channel.to_string())
				.map_err(|source| CarrierError::Export { channel: self.channel, path, source })?;
			self.exported_here = true;
			if !wait_for_node(&node.join("period")) {
				return Err(CarrierError::NotExported { channel: self.channel, path: node });
			}
		}

		// The kernel rejects a period shorter than the current duty cycle
		self.write("enable", "0")?;
		self.write("duty_cycle", "0")?;
		self.write("period", &period.to_string())?;
		self.write("duty_cycle", &(period / 2).to_string())?;
		self.configured = true;

		info!(
			channel = self.channel,
			period_ns = period,
			frequency = 1e9 / period as f64,
			"PWM carrier configured"
		);
		Ok(())
	}

	fn enable(&mut self) -> Result<(), CarrierError> {
		if !self.configured {
			return Err(CarrierError::NotConfigured);
		}
		self.write("enable", "1")
	}

	fn disable(&mut self) -> Result<(), CarrierError> {
		if !self.configured {
			return Ok(());
		}
		self.write("enable", "0")
	}

	fn release(&mut self) -> Result<(), CarrierError> {
		// A failed configure can leave the channel exported but unconfigured
		let disabled = if self.configured {
			let r = self.disable();
			self.configured = false;
			r
		} else {
			Ok(())
		};

		if self.exported_here {
			self.exported_here = false;
			let path = self.chip.join("unexport");
			fs::write(&path, self.channel.to_string())
				.map_err(|source| CarrierError::Write { path, source })?;
		}
		disabled?;
		debug!(channel = self.channel, "PWM carrier released");
		Ok(())
	}
}
