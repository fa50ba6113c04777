//! The carrier attenuation output.
//!
//! The carrier amplitude is switched through an open-drain style line. Driven low holds the
//! carrier at full amplitude; released (high impedance) lets it drop to the reduced level.

use std::{fs, io, path::PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use crate::wait_for_node;

/// Default sysfs GPIO class directory.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Default attenuation line (GPIO 23).
pub const DEFAULT_GPIO_LINE: u32 = 23;

/// The state of the attenuation line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
	/// High impedance. Logical 0, reduced carrier.
	Released,
	/// Output driven low. Logical 1, full carrier.
	DrivenLow
}

/// The error type for digital output operations.
#[derive(Debug, Error)]
pub enum GpioError {
	/// The line could not be exported.
	#[error("failed to export GPIO {line} via {path}: {source}")]
	Export { line: u32, path: PathBuf, source: io::Error },
	/// The exported line never appeared in sysfs.
	#[error("GPIO {line} did not appear at {path}")]
	NotExported { line: u32, path: PathBuf },
	/// A sysfs attribute write failed.
	#[error("failed to write {path}: {source}")]
	Write { path: PathBuf, source: io::Error },
	/// The line was driven before [`DigitalOutput::configure`].
	#[error("GPIO {0} is not configured")]
	NotConfigured(u32)
}

/// A digital output line.
pub trait DigitalOutput: Send {
	/// Claim the line and set it to `idle`.
	fn configure(&mut self, idle: Level) -> Result<(), GpioError>;

	/// Set the line to `level`.
	fn drive(&mut self, level: Level) -> Result<(), GpioError>;

	/// Return the line to high impedance and give it back. Releasing an unclaimed line is a no-op.
	fn release(&mut self) -> Result<(), GpioError>;
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
	fn configure(&mut self, idle: Level) -> Result<(), GpioError> {
		(**self).configure(idle)
	}

	fn drive(&mut self, level: Level) -> Result<(), GpioError> {
		(**self).drive(level)
	}

	fn release(&mut self) -> Result<(), GpioError> {
		(**self).release()
	}
}

/// A GPIO line driven through the Linux sysfs interface.
///
/// [`Level::Released`] writes `in` to the line's `direction`, making it an input.
/// [`Level::DrivenLow`] writes `low`, which switches to output and drives low in one step so the
/// line never glitches high.
#[derive(Debug)]
pub struct SysfsGpio {
	root: PathBuf,
	line: u32,
	claimed: bool,
	exported_here: bool
}

impl SysfsGpio {
	/// Construct a driver for `line` under the sysfs GPIO directory `root`. Nothing is touched until
	/// [`DigitalOutput::configure`].
	pub fn new(root: impl Into<PathBuf>, line: u32) -> SysfsGpio {
		SysfsGpio { root: root.into(), line, claimed: false, exported_here: false }
	}

	/// The GPIO line number.
	pub fn line(&self) -> u32 {
		self.line
	}

	fn node(&self) -> PathBuf {
		self.root.join(format!("gpio{}", self.line))
	}

	fn write_direction(&self, level: Level) -> Result<(), GpioError> {
		let path = self.node().join("direction");
		let value = match level {
			Level::Released => "in",
			Level::DrivenLow => "low"
		};
		fs::write(&path, value).map_err(|source| GpioError::Write { path, source })
	}
}

impl DigitalOutput for SysfsGpio {
	fn configure(&mut self, idle: Level) -> Result<(), GpioError> {
		let node = self.node();
		if !node.exists() {
			let path = self.root.join("export");
			fs::write(&path, self.line.to_string())
				.map_err(|source| GpioError::Export { line: self.line, path, source })?;
			self.exported_here = true;
			if !wait_for_node(&node.join("direction")) {
				return Err(GpioError::NotExported { line: self.line, path: node });
			}
		}

		self.write_direction(idle)?;
		self.claimed = true;
		info!(line = self.line, ?idle, "GPIO configured");
		Ok(())
	}

	fn drive(&mut self, level: Level) -> Result<(), GpioError> {
		if !self.claimed {
			return Err(GpioError::NotConfigured(self.line));
		}
		self.write_direction(level)
	}

	fn release(&mut self) -> Result<(), GpioError> {
		// A failed configure can leave the line exported but unclaimed
		let released = if self.claimed {
			self.claimed = false;
			self.write_direction(Level::Released)
		} else {
			Ok(())
		};

		if self.exported_here {
			self.exported_here = false;
			let path = self.root.join("unexport");
			fs::write(&path, self.line.to_string())
				.map_err(|source| GpioError::Write { path, source })?;
		}
		released?;
		debug!(line = self.line, "GPIO released");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	/// Build a sysfs GPIO tree with `line` already exported.
	fn exported(line: u32) -> TempDir {
		let dir = tempfile::tempdir().unwrap();
		let node = dir.path().join(format!("gpio{}", line));
		fs::create_dir(&node).unwrap();
		fs::write(node.join("direction"), "in").unwrap();
		dir
	}

	fn direction(dir: &TempDir, line: u32) -> String {
		fs::read_to_string(dir.path().join(format!("gpio{}/direction", line))).unwrap()
	}

	#[test]
	fn drive_test() {
		let dir = exported(23);
		let mut gpio = SysfsGpio::new(dir.path(), 23);

		gpio.configure(Level::Released).unwrap();
		assert_eq!(direction(&dir, 23), "in");
		gpio.drive(Level::DrivenLow).unwrap();
		assert_eq!(direction(&dir, 23), "low");
		gpio.drive(Level::Released).unwrap();
		assert_eq!(direction(&dir, 23), "in");

		gpio.drive(Level::DrivenLow).unwrap();
		gpio.release().unwrap();
		assert_eq!(direction(&dir, 23), "in");

		// Already exported by someone else, so not unexported here
		assert!(!dir.path().join("unexport").exists());
	}

	#[test]
	fn not_configured_test() {
		let dir = exported(23);
		let mut gpio = SysfsGpio::new(dir.path(), 23);
		assert!(matches!(gpio.drive(Level::DrivenLow), Err(GpioError::NotConfigured(23))));
		gpio.release().unwrap();
		assert_eq!(direction(&dir, 23), "in");
	}

	#[test]
	fn export_timeout_test() {
		let dir = tempfile::tempdir().unwrap();
		let mut gpio = SysfsGpio::new(dir.path(), 5);
		let err = gpio.configure(Level::Released).unwrap_err();
		assert!(matches!(err, GpioError::NotExported { line: 5, .. }));
		assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "5");
	}

	#[test]
	fn export_failure_test() {
		let dir = tempfile::tempdir().unwrap();
		let mut gpio = SysfsGpio::new(dir.path().join("missing"), 5);
		assert!(matches!(gpio.configure(Level::Released), Err(GpioError::Export { line: 5, .. })));
	}

	#[test]
	fn export_release_test() {
		let dir = tempfile::tempdir().unwrap();
		let root = dir.path().to_path_buf();

		// Emulate the kernel creating the node shortly after the export write
		let node = root.join("gpio7");
		let creator = std::thread::spawn(move || {
			while !root.join("export").exists() {
				std::thread::sleep(std::time::Duration::from_millis(1));
			}
			fs::create_dir(&node).unwrap();
			fs::write(node.join("direction"), "in").unwrap();
		});

		let mut gpio = SysfsGpio::new(dir.path(), 7);
		gpio.configure(Level::Released).unwrap();
		creator.join().unwrap();
		gpio.release().unwrap();
		assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "7");
	}

	#[test]
	fn failed_configure_unexport_test() {
		let dir = tempfile::tempdir().unwrap();
		let root = dir.path().to_path_buf();

		// The node appears, but its direction attribute cannot be written
		let node = root.join("gpio9");
		let creator = std::thread::spawn(move || {
			while !root.join("export").exists() {
				std::thread::sleep(std::time::Duration::from_millis(1));
			}
			fs::create_dir_all(node.join("direction")).unwrap();
		});

		let mut gpio = SysfsGpio::new(dir.path(), 9);
		assert!(matches!(gpio.configure(Level::DrivenLow), Err(GpioError::Write { .. })));
		creator.join().unwrap();

		gpio.release().unwrap();
		assert_eq!(fs::read_to_string(dir.path().join("unexport")).unwrap(), "9");
	}
}
