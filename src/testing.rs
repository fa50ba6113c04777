//! In-memory collaborators for worker tests.

use std::{
	io,
	net::{Ipv4Addr, SocketAddr, UdpSocket},
	path::PathBuf,
	sync::{Arc, Mutex},
	thread
};
use hw::{CarrierError, CarrierGenerator, DigitalOutput, GpioError, Level};
use time::{Clock, ClockError, TimeSpec};

type Hook = Box<dyn FnOnce() -> Option<TimeSpec> + Send>;

/// A clock that only moves when slept against.
///
/// Hooks fire once the clock reaches their instant and may move the clock elsewhere, which
/// emulates a stepped system clock.
pub struct VirtualClock {
	now: Mutex<TimeSpec>,
	hooks: Mutex<Vec<(TimeSpec, Hook)>>
}

impl VirtualClock {
	pub fn new(now: TimeSpec) -> Arc<VirtualClock> {
		Arc::new(VirtualClock { now: Mutex::new(now), hooks: Mutex::new(Vec::new()) })
	}

	/// Run `hook` once the clock reaches `at`.
	pub fn at(&self, at: TimeSpec, hook: impl FnOnce() -> Option<TimeSpec> + Send + 'static) {
		self.hooks.lock().unwrap().push((at, Box::new(hook)));
	}

	/// Step the clock to `to` once it reaches `at`.
	pub fn jump(&self, at: TimeSpec, to: TimeSpec) {
		self.at(at, move || Some(to));
	}
}

impl Clock for VirtualClock {
	fn now(&self) -> Option<TimeSpec> {
		Some(*self.now.lock().unwrap())
	}

	fn sleep_until(&self, deadline: TimeSpec) -> Result<(), ClockError> {
		let mut now = self.now.lock().unwrap();
		if deadline > *now {
			*now = deadline;
		}

		let mut hooks = self.hooks.lock().unwrap();
		let (due, pending): (Vec<_>, Vec<_>) = hooks.drain(..).partition(|(at, _)| *at <= *now);
		*hooks = pending;
		for (_, hook) in due {
			if let Some(to) = hook() {
				*now = to;
			}
		}
		Ok(())
	}
}

/// Everything the fakes observed, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
	Configure(Level),
	Drive(TimeSpec, Level),
	Release,
	CarrierConfigure(u32, f64),
	CarrierEnable,
	CarrierDisable,
	CarrierRelease
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
	Arc::new(Mutex::new(Vec::new()))
}

fn injected() -> io::Error {
	io::Error::other("injected failure")
}

/// A [`DigitalOutput`] recording every call with the virtual time it happened at.
pub struct RecordingOutput {
	clock: Arc<VirtualClock>,
	log: EventLog,
	/// Fail the drive after this many successful drives.
	fail_after: Option<usize>,
	drives: usize
}

impl RecordingOutput {
	pub fn new(clock: Arc<VirtualClock>, log: EventLog) -> RecordingOutput {
		RecordingOutput { clock, log, fail_after: None, drives: 0 }
	}

	pub fn failing_after(mut self, drives: usize) -> RecordingOutput {
		self.fail_after = Some(drives);
		self
	}
}

impl DigitalOutput for RecordingOutput {
	fn configure(&mut self, idle: Level) -> Result<(), GpioError> {
		self.log.lock().unwrap().push(Event::Configure(idle));
		Ok(())
	}

	fn drive(&mut self, level: Level) -> Result<(), GpioError> {
		if self.fail_after == Some(self.drives) {
			return Err(GpioError::Write { path: PathBuf::from("direction"), source: injected() });
		}
		self.drives += 1;
		let now = self.clock.now().unwrap();
		self.log.lock().unwrap().push(Event::Drive(now, level));
		Ok(())
	}

	fn release(&mut self) -> Result<(), GpioError> {
		self.log.lock().unwrap().push(Event::Release);
		Ok(())
	}
}

/// A [`CarrierGenerator`] recording every call.
pub struct RecordingCarrier {
	log: EventLog,
	fail_configure: bool
}

impl RecordingCarrier {
	pub fn new(log: EventLog) -> RecordingCarrier {
		RecordingCarrier { log, fail_configure: false }
	}

	pub fn failing(log: EventLog) -> RecordingCarrier {
		RecordingCarrier { log, fail_configure: true }
	}
}

impl CarrierGenerator for RecordingCarrier {
	fn configure(&mut self, loops: u32, divider: f64) -> Result<(), CarrierError> {
		if self.fail_configure {
			return Err(CarrierError::Write { path: PathBuf::from("period"), source: injected() });
		}
		self.log.lock().unwrap().push(Event::CarrierConfigure(loops, divider));
		Ok(())
	}

	fn enable(&mut self) -> Result<(), CarrierError> {
		self.log.lock().unwrap().push(Event::CarrierEnable);
		Ok(())
	}

	fn disable(&mut self) -> Result<(), CarrierError> {
		self.log.lock().unwrap().push(Event::CarrierDisable);
		Ok(())
	}

	fn release(&mut self) -> Result<(), CarrierError> {
		self.log.lock().unwrap().push(Event::CarrierRelease);
		Ok(())
	}
}

/// Answer one NTP request on a loopback socket with the given leap indicator and Unix time.
pub fn serve_ntp(leap: u8, unix: i64) -> (SocketAddr, thread::JoinHandle<()>) {
	let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
	let addr = socket.local_addr().unwrap();
	let handle = thread::spawn(move || {
		let mut buf = [0; 128];
		let (_, peer) = socket.recv_from(&mut buf).unwrap();
		let mut packet = [0u8; 48];
		packet[0] = (leap << 6) | 0x24; // version 4, mode 4 (server)
		packet[1] = 2;
		let ntp = (unix + 2_208_988_800) as u32;
		packet[40..44].copy_from_slice(&ntp.to_be_bytes());
		socket.send_to(&packet, peer).unwrap();
	});
	(addr, handle)
}
