//! Transmit the DCF77 time signal from a Raspberry Pi.
//!
//! A PWM channel generates the 77.5 kHz [DCF77] carrier, and a GPIO line switches it between full
//! and reduced amplitude to send the minute frame. A `1` bit reduces the carrier for 200 ms. A `0`
//! bit and the last second of the minute stay at full carrier throughout, so receivers only see
//! the one bits and the minute gap and need a cleaner signal to lock than with Mainflingen.
//!
//! Two workers do the work. The carrier worker starts the square wave and leaves it running. The
//! transmission worker encodes one frame per minute and drives the attenuation line on the
//! absolute wall-clock second grid. Both are pinned to their own core with real-time priority,
//! and [`shutdown`] makes sure the modulation stops before the carrier does.
//!
//! [DCF77]: https://en.wikipedia.org/wiki/DCF77
//!
//! # Command Line Arguments
//!
//! General form: `dcf77tx --source <local|ntp> [options...]`
//!
//! | Short form | Long form       | Argument         | Default                   | Description                          |
//! | ---------- | --------------- | ---------------- | ------------------------- | ------------------------------------ |
//! | `-s`       | `--source`      | `local` or `ntp` | Required                  | Where the transmitted time comes from |
//! | `-l`       | `--limit`       | Integer > 0      | 960                       | The number of minutes to transmit    |
//! | `-o`       | `--offset`      | Integer          | 0                         | Minutes added to the transmitted time |
//! | `-v`       | `--verbose`     | None             | Off                       | Log every transmitted second         |
//! |            | `--server`      | Hostname or IP   | `pool.ntp.org`            | The [NTP] server for `--source ntp`  |
//! |            | `--gpio-root`   | Directory        | `/sys/class/gpio`         | Sysfs GPIO directory                 |
//! |            | `--gpio-line`   | Integer          | 23                        | The attenuation GPIO line            |
//! |            | `--pwm-chip`    | Directory        | `/sys/class/pwm/pwmchip0` | Sysfs PWM chip                       |
//! |            | `--pwm-channel` | Integer          | 2                         | The carrier PWM channel              |
//! |            | `--no-realtime` | None             | Off                       | Skip memory locking and core pinning |
//!
//! The time source is read once at startup. Seconds are then paced by the local clock, so with
//! `--source ntp` the local clock should itself be synchronized. Logging goes to stderr and can
//! be tuned with `RUST_LOG`.
//!
//! [NTP]: sntp
//!
//! # Examples
//!
//! Transmit the local time for an hour
//! ```sh
//! dcf77tx -s local -l 60
//! ```
//!
//! Transmit NTP time shifted back by 90 minutes, logging every second
//! ```sh
//! dcf77tx -s ntp --server time.google.com -o -90 -v
//! ```

pub mod args;
pub mod carrier;
pub mod config;
pub mod error;
pub mod logging;
pub mod realtime;
pub mod shutdown;
pub mod source;
pub mod supervisor;
pub mod transmit;

#[cfg(test)]
mod testing;

pub use error::Error;

use std::sync::Arc;
use hw::{SysfsGpio, SysfsPwmCarrier, solver::REFERENCE_HZ};
use time::SystemClock;
use tracing::info;
use config::{SourceKind, TransmissionConfig};
use shutdown::Shutdown;
use source::{LocalSource, NtpSource, TimeSource};

/// Run the transmitter until the minute limit is reached or a signal arrives.
///
/// # Errors
///
/// Returns an error if the signal handler cannot be installed, the time source fails, or either
/// worker fails.
pub fn run(config: Arc<TransmissionConfig>) -> Result<(), Error> {
	let shutdown = Shutdown::new();
	{
		let shutdown = shutdown.clone();
		ctrlc::set_handler(move || {
			info!("signal received, stopping");
			shutdown.signal_stop();
		})?;
	}

	if config.realtime {
		realtime::lock_memory_or_warn();
		realtime::setup_current_thread("supervisor", realtime::SUPERVISOR_CORE);
	}

	let reference = match config.source {
		SourceKind::Local => LocalSource::new(SystemClock).reference()?,
		SourceKind::Ntp => NtpSource::new(config.server.clone(), SystemClock).reference()?
	};

	let hardware = &config.hardware;
	let output = SysfsGpio::new(hardware.gpio_root.clone(), hardware.gpio_line);
	let generator = SysfsPwmCarrier::new(hardware.pwm_chip.clone(), hardware.pwm_channel, REFERENCE_HZ);
	info!(
		source = ?config.source,
		minutes = config.minute_limit.get(),
		offset = config.offset_minutes,
		gpio_line = hardware.gpio_line,
		pwm_channel = hardware.pwm_channel,
		"starting transmitter"
	);

	supervisor::run_workers(config, Arc::new(SystemClock), output, generator, reference, shutdown)
}
