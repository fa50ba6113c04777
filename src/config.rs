//! Runtime configuration shared by both workers.

use std::{num::NonZeroU32, path::PathBuf};
use clap::ValueEnum;
use hw::{carrier::{DEFAULT_PWM_CHANNEL, DEFAULT_PWM_CHIP}, output::{DEFAULT_GPIO_LINE, DEFAULT_GPIO_ROOT}};

/// Default number of minutes to transmit (16 hours).
pub const DEFAULT_MINUTE_LIMIT: NonZeroU32 = match NonZeroU32::new(960) {
	Some(limit) => limit,
	None => panic!("minute limit must be nonzero")
};

/// Where the transmitted time comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
	/// The local system clock.
	Local,
	/// An NTP server.
	Ntp
}

/// Sysfs locations of the hardware collaborators.
#[derive(Clone, Debug, PartialEq)]
pub struct HardwareConfig {
	/// Sysfs GPIO class directory.
	pub gpio_root: PathBuf,
	/// Attenuation GPIO line.
	pub gpio_line: u32,
	/// Sysfs PWM chip directory.
	pub pwm_chip: PathBuf,
	/// Carrier PWM channel.
	pub pwm_channel: u32
}

impl Default for HardwareConfig {
	fn default() -> Self {
		HardwareConfig {
			gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
			gpio_line: DEFAULT_GPIO_LINE,
			pwm_chip: PathBuf::from(DEFAULT_PWM_CHIP),
			pwm_channel: DEFAULT_PWM_CHANNEL
		}
	}
}

/// Immutable transmitter configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct TransmissionConfig {
	/// Time source.
	pub source: SourceKind,
	/// Number of minutes to transmit before exiting.
	pub minute_limit: NonZeroU32,
	/// Whole minutes added to the encoded time.
	pub offset_minutes: i32,
	/// Log every second as well as every minute.
	pub verbose: bool,
	/// NTP server for [`SourceKind::Ntp`].
	pub server: String,
	/// Hardware locations.
	pub hardware: HardwareConfig,
	/// Lock memory, pin threads and use real-time scheduling.
	pub realtime: bool
}

impl TransmissionConfig {
	/// Construct a configuration with defaults for everything but the source.
	pub fn new(source: SourceKind) -> TransmissionConfig {
		TransmissionConfig {
			source,
			minute_limit: DEFAULT_MINUTE_LIMIT,
			offset_minutes: 0,
			verbose: false,
			server: String::from(sntp::DEFAULT_SERVER),
			hardware: HardwareConfig::default(),
			realtime: true
		}
	}
}
