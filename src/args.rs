//! Support for command line argument parsing.
//!
//! See [crate] documentation for details on command line arguments and examples.

use std::{num::NonZeroU32, path::PathBuf};
use clap::Parser;
use hw::{carrier::{DEFAULT_PWM_CHANNEL, DEFAULT_PWM_CHIP}, output::{DEFAULT_GPIO_LINE, DEFAULT_GPIO_ROOT}};
use crate::config::{DEFAULT_MINUTE_LIMIT, HardwareConfig, SourceKind, TransmissionConfig};

/// Parsed command line arguments.
#[derive(Debug, Parser)]
#[command(name = "dcf77tx", version)]
#[command(about = "Transmit the DCF77 time signal on a Raspberry Pi", long_about = None)]
pub struct Arguments {
	/// Time source to transmit
	#[arg(short, long, value_enum)]
	pub source: SourceKind,

	/// Number of minutes to transmit
	#[arg(short, long, default_value_t = DEFAULT_MINUTE_LIMIT)]
	pub limit: NonZeroU32,

	/// Minutes added to the transmitted time (may be negative)
	#[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
	pub offset: i32,

	/// Log every transmitted second
	#[arg(short, long)]
	pub verbose: bool,

	/// NTP server (host, host:port, or IP address)
	#[arg(long, default_value = sntp::DEFAULT_SERVER)]
	pub server: String,

	/// Sysfs GPIO directory
	#[arg(long, default_value = DEFAULT_GPIO_ROOT)]
	pub gpio_root: PathBuf,

	/// GPIO line driving the carrier attenuator
	#[arg(long, default_value_t = DEFAULT_GPIO_LINE)]
	pub gpio_line: u32,

	/// Sysfs PWM chip generating the carrier
	#[arg(long, default_value = DEFAULT_PWM_CHIP)]
	pub pwm_chip: PathBuf,

	/// PWM channel generating the carrier
	#[arg(long, default_value_t = DEFAULT_PWM_CHANNEL)]
	pub pwm_channel: u32,

	/// Skip memory locking, core pinning and real-time scheduling
	#[arg(long)]
	pub no_realtime: bool
}

impl From<Arguments> for TransmissionConfig {
	fn from(args: Arguments) -> Self {
		TransmissionConfig {
			source: args.source,
			minute_limit: args.limit,
			offset_minutes: args.offset,
			verbose: args.verbose,
			server: args.server,
			hardware: HardwareConfig {
				gpio_root: args.gpio_root,
				gpio_line: args.gpio_line,
				pwm_chip: args.pwm_chip,
				pwm_channel: args.pwm_channel
			},
			realtime: !args.no_realtime
		}
	}
}
