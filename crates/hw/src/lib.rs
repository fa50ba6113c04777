//! Hardware collaborators of the transmitter.
//!
//! The transmitter needs two things from hardware: a digital output line that switches the
//! carrier between full and reduced amplitude ([`output`]), and a square wave generator
//! producing the 77.5 kHz carrier ([`carrier`]). Both are small capability traits so the timing
//! code can run against in-memory fakes. The Linux implementations drive sysfs GPIO and PWM
//! attributes.
//!
//! [`solver`] finds the loop count and clock divider that best approximate the carrier
//! frequency for the generator's square wave program.

pub mod carrier;
pub mod output;
pub mod solver;

pub use carrier::{CARRIER_PROGRAM, CarrierError, CarrierGenerator, SysfsPwmCarrier, program_cycles};
pub use output::{DigitalOutput, GpioError, Level, SysfsGpio};
pub use solver::{ClockSolution, SolverError, solve};

use std::{path::Path, thread, time::Duration};

/// Number of polls while waiting for an exported sysfs node to appear.
const EXPORT_POLLS: u32 = 20;

/// Delay between polls for an exported sysfs node.
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Wait for `path` to appear after an export, returning whether it did.
///
/// Udev applies permissions to newly exported nodes asynchronously, so the node can lag the write
/// to `export` by a few milliseconds.
fn wait_for_node(path: &Path) -> bool {
	for _ in 0..EXPORT_POLLS {
		if path.exists() {
			return true;
		}
		thread::sleep(EXPORT_POLL_INTERVAL);
	}
	path.exists()
}
