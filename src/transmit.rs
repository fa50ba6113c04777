//! The transmission loop.
//!
//! Each minute the loop encodes the frame for the minute that ends at the next minute marker,
//! then walks its seconds on the absolute wall-clock grid: sleep until the start of the second,
//! set the carrier state, and pull the carrier back to full amplitude after the pulse width.
//! Sleeps always target absolute instants, so a late wakeup never shifts later seconds. Waits
//! longer than a second are taken in steps so a stop request is noticed within a second.

use dcf77::{CalendarMoment, CarrierState, FrameEncoder, MinuteFrame, Modulation, modulation_for, zone};
use hw::{DigitalOutput, Level};
use time::{Clock, Milliseconds, SECONDS_PER_DAY, SECONDS_PER_MINUTE, Seconds, TimeSpec};
use tracing::{debug, info, warn};
use crate::{
	config::TransmissionConfig,
	error::Error,
	realtime::{self, TRANSMISSION_CORE},
	shutdown::Shutdown,
	source::TimeReference
};

/// Years a DCF77 frame can carry.
const FRAME_YEARS: std::ops::RangeInclusive<i32> = 2000..=2099;

/// The first full minute after `reference`.
///
/// Starting on the next boundary means the first frame is never cut short.
#[inline(always)]
pub fn first_minute(reference: i64) -> i64 {
	(reference.div_euclid(SECONDS_PER_MINUTE) + 1) * SECONDS_PER_MINUTE
}

/// Number of seconds in the minute carrying `frame`.
#[inline(always)]
pub fn minute_length(frame: &MinuteFrame) -> i64 {
	if frame.leap_marker() { SECONDS_PER_MINUTE + 1 } else { SECONDS_PER_MINUTE }
}

/// The output level realizing a carrier state.
#[inline(always)]
fn level_for(state: CarrierState) -> Level {
	match state {
		CarrierState::Full => Level::DrivenLow,
		CarrierState::Reduced => Level::Released
	}
}

/// Whether a leap second announced at `reference` applies to the minute encoded at `encoded`.
///
/// An announcement covers the coming end of day only.
#[inline(always)]
fn leap_pending(reference: TimeReference, encoded: i64) -> bool {
	reference.leap && encoded - reference.sec < SECONDS_PER_DAY
}

/// Sleep until `deadline` in steps of at most one second.
///
/// Returns `Ok(false)` as soon as a stop is requested.
fn sleep_until_or_stop<K>(clock: &K, deadline: TimeSpec, shutdown: &Shutdown)
	-> Result<bool, Error>
where K: Clock + ?Sized
{
	loop {
		if shutdown.should_stop() {
			return Ok(false);
		}
		let now = clock.now().ok_or(Error::ClockUnavailable)?;
		if now >= deadline {
			return Ok(true);
		}
		clock.sleep_until(deadline.min(now + Seconds(1)))?;
	}
}

/// Encode the civil minute containing the Unix timestamp `unix`.
///
/// # Errors
///
/// Returns [`Error::UnsupportedTime`] if `unix` cannot be converted to Central European time or
/// falls outside the years a frame can carry.
pub fn frame_for(encoder: &mut FrameEncoder, unix: i64, leap: bool)
	-> Result<(CalendarMoment, MinuteFrame), Error>
{
	let local = zone::berlin(unix).ok_or(Error::UnsupportedTime(unix))?;
	if !FRAME_YEARS.contains(&local.tm.year()) {
		return Err(Error::UnsupportedTime(unix));
	}
	let moment = CalendarMoment::from_local(&local);
	Ok((moment, encoder.encode(&moment, leap)))
}

/// Transmit the seconds of `frame` in the minute starting at the Unix timestamp `minute_start`.
///
/// Returns `Ok(false)` if a stop was requested before the minute completed.
///
/// # Errors
///
/// Returns an error if the clock cannot be read or slept against, or if the output fails.
pub fn transmit_minute<K, O>(
	clock: &K,
	output: &mut O,
	frame: &MinuteFrame,
	minute_start: i64,
	shutdown: &Shutdown
) -> Result<bool, Error>
where K: Clock + ?Sized, O: DigitalOutput + ?Sized
{
	for second in 0..minute_length(frame) {
		let slot = TimeSpec::at(minute_start + second);
		if !sleep_until_or_stop(clock, slot, shutdown)? {
			return Ok(false);
		}
		let now = clock.now().ok_or(Error::ClockUnavailable)?;
		if now >= slot + Seconds(1) {
			warn!(second, late_s = now.sec - slot.sec, "clock passed the end of the second, skipping it");
			continue;
		}

		let Modulation { state, active_ms } = modulation_for(second as u8, frame);
		output.drive(level_for(state))?;
		debug!(second, ?state, active_ms, "second");
		if active_ms > 0 {
			clock.sleep_until(slot + Milliseconds(active_ms as i64))?;
			output.drive(Level::DrivenLow)?;
		}
	}
	Ok(true)
}

/// Transmit up to `config.minute_limit` minutes starting at the first full minute after
/// `reference`.
///
/// The encoded time is shifted by `config.offset_minutes`; the seconds themselves always follow
/// the real clock.
///
/// A leap second announced by `reference` applies to the encoded 23:59 minute within a day of it
/// only. The minute carrying it is 61 seconds long, and every later minute then starts one second
/// after the Unix minute boundary, since the loop keeps counting seconds across the leap instead
/// of following the clock's repeated second.
pub fn transmit<K, O>(
	config: &TransmissionConfig,
	clock: &K,
	output: &mut O,
	reference: TimeReference,
	shutdown: &Shutdown
) -> Result<(), Error>
where K: Clock + ?Sized, O: DigitalOutput + ?Sized
{
	let mut encoder = FrameEncoder::new();
	let offset = i64::from(config.offset_minutes) * SECONDS_PER_MINUTE;
	let mut minute_start = first_minute(reference.sec);

	for _ in 0..config.minute_limit.get() {
		if shutdown.should_stop() {
			info!("stop requested");
			return Ok(());
		}

		// The frame describes the minute that begins at the end of this one
		let encoded = minute_start + SECONDS_PER_MINUTE + offset;
		let (moment, frame) = frame_for(&mut encoder, encoded, leap_pending(reference, encoded))?;
		let civil = format!(
			"{}-{:02}-{:02} {:02}:{:02} {}",
			moment.full_year(), moment.month, moment.day, moment.hour, moment.minute,
			if moment.dst { "CEST" } else { "CET" }
		);
		info!(time = %civil, leap = frame.leap_marker(), frame = %frame, "minute");

		if !transmit_minute(clock, output, &frame, minute_start, shutdown)? {
			info!("stop requested");
			return Ok(());
		}
		minute_start += minute_length(&frame);
	}

	info!(minutes = config.minute_limit.get(), "minute limit reached");
	Ok(())
}

/// Body of the transmission worker thread.
///
/// Claims `output`, runs [`transmit`], and always releases the output and reports the exit to
/// `shutdown`, however the run ended.
pub fn transmission_worker<K, O>(
	config: &TransmissionConfig,
	clock: &K,
	mut output: O,
	reference: TimeReference,
	shutdown: &Shutdown
) -> Result<(), Error>
where K: Clock + ?Sized, O: DigitalOutput
{
	if config.realtime {
		realtime::setup_current_thread("transmission", TRANSMISSION_CORE);
	}

	let result = output.configure(Level::DrivenLow)
		.map_err(Error::from)
		.and_then(|()| transmit(config, clock, &mut output, reference, shutdown));
	if let Err(e) = &result {
		warn!(error = %e, "transmission failed");
	}

	let released = output.release().map_err(Error::from);
	if let Err(e) = &released {
		warn!(error = %e, "failed to release output");
	}
	shutdown.mark_output_released();
	shutdown.worker_finished();
	result.and(released)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::num::NonZeroU32;
	use crate::{config::SourceKind, testing::{Event, RecordingOutput, VirtualClock, event_log}};

	/// Config for `minutes` minutes without real-time setup.
	fn config(minutes: u32) -> TransmissionConfig {
		TransmissionConfig {
			minute_limit: NonZeroU32::new(minutes).unwrap(),
			realtime: false,
			..TransmissionConfig::new(SourceKind::Local)
		}
	}

	fn drives(log: &[Event]) -> Vec<(TimeSpec, Level)> {
		log.iter()
			.filter_map(|e| match e {
				Event::Drive(t, l) => Some((*t, *l)),
				_ => None
			})
			.collect()
	}

	/// The drives expected for one minute of `frame` starting at `start`.
	fn expected(frame: &MinuteFrame, start: i64) -> Vec<(TimeSpec, Level)> {
		let mut out = Vec::new();
		for second in 0..minute_length(frame) {
			let slot = TimeSpec::at(start + second);
			let m = modulation_for(second as u8, frame);
			out.push((slot, level_for(m.state)));
			if m.active_ms > 0 {
				out.push((slot + Milliseconds(m.active_ms as i64), Level::DrivenLow));
			}
		}
		out
	}

	#[test]
	fn first_minute_test() {
		assert_eq!(first_minute(1716742650), 1716742680);
		assert_eq!(first_minute(1716742680), 1716742740);
		assert_eq!(first_minute(-1), 0);
	}

	#[test]
	fn level_for_test() {
		// Driving low holds the full carrier, releasing attenuates it
		assert_eq!(level_for(CarrierState::Full), Level::DrivenLow);
		assert_eq!(level_for(CarrierState::Reduced), Level::Released);
	}

	#[test]
	fn leap_pending_test() {
		let announced = TimeReference { sec: 1483225050, leap: true };
		assert!(leap_pending(announced, 1483225140));
		assert!(!leap_pending(announced, 1483225050 + SECONDS_PER_DAY));
		assert!(!leap_pending(TimeReference { leap: false, ..announced }, 1483225140));
	}

	#[test]
	fn frame_for_test() {
		let mut encoder = FrameEncoder::new();
		// 2024-05-26 16:59:00 UTC, 18:59 CEST
		let (moment, frame) = frame_for(&mut encoder, 1716742740, false).unwrap();
		assert_eq!((moment.hour, moment.minute, moment.dst), (18, 59, true));
		assert_eq!(frame.bits(), 0x090BE630B320000);

		assert!(matches!(frame_for(&mut encoder, -60, false), Err(Error::UnsupportedTime(-60))));
		// 1999-12-31 23:00 CET converts fine but cannot be carried by a frame
		assert!(matches!(frame_for(&mut encoder, 946677600, false), Err(Error::UnsupportedTime(946677600))));
	}

	#[test]
	fn one_minute_test() {
		let clock = VirtualClock::new(TimeSpec { sec: 1716742650, nsec: 123 });
		let log = event_log();
		let shutdown = Shutdown::new();
		let output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };

		transmission_worker(&config(1), &*clock, output, reference, &shutdown).unwrap();

		let log = log.lock().unwrap();
		assert_eq!(log.first(), Some(&Event::Configure(Level::DrivenLow)));
		assert_eq!(log.last(), Some(&Event::Release));

		let frame = MinuteFrame::from_bits(0x090BE630B320000);
		let drives = drives(&log);
		assert_eq!(drives, expected(&frame, 1716742680));
		// Second 20 is a 200ms reduction, second 0 stays at full carrier, second 59 a single edge
		assert!(drives.contains(&(TimeSpec::at(1716742700), Level::Released)));
		assert!(drives.contains(&(TimeSpec::at(1716742700) + Milliseconds(200), Level::DrivenLow)));
		assert!(drives.contains(&(TimeSpec::at(1716742680), Level::DrivenLow)));
		assert!(drives.contains(&(TimeSpec::at(1716742680) + Milliseconds(100), Level::DrivenLow)));
		assert_eq!(drives.last(), Some(&(TimeSpec::at(1716742739), Level::DrivenLow)));
		assert_eq!(drives.len(), 59 * 2 + 1);

		assert_eq!(shutdown.exit_code(), crate::shutdown::WORKER_FINISHED);
		assert!(!shutdown.should_stop());
		shutdown.signal_stop();
		assert!(shutdown.should_stop_carrier());
	}

	#[test]
	fn minutes_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		let mut output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };

		transmit(&config(3), &*clock, &mut output, reference, &shutdown).unwrap();

		let mut encoder = FrameEncoder::new();
		let mut all = Vec::new();
		for minute in 0..3 {
			let start = 1716742680 + minute * 60;
			let (_, frame) = frame_for(&mut encoder, start + 60, false).unwrap();
			all.extend(expected(&frame, start));
		}
		assert_eq!(drives(&log.lock().unwrap()), all);
		assert_eq!(clock.now().unwrap(), TimeSpec::at(1716742859));
	}

	#[test]
	fn offset_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		let mut output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };
		let config = TransmissionConfig { offset_minutes: -1, ..config(1) };

		transmit(&config, &*clock, &mut output, reference, &shutdown).unwrap();

		// Deadlines stay on the real grid while the encoded minute moves back to 18:58
		let frame = MinuteFrame::from_bits(0x090BE631B120000);
		assert_eq!(drives(&log.lock().unwrap()), expected(&frame, 1716742680));
	}

	#[test]
	fn leap_minute_test() {
		// 2016-12-31 22:57:30 UTC. The next minute carries 23:59 CET with a leap second.
		let clock = VirtualClock::new(TimeSpec::at(1483225050));
		let log = event_log();
		let shutdown = Shutdown::new();
		let mut output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1483225050, leap: true };

		transmit(&config(2), &*clock, &mut output, reference, &shutdown).unwrap();

		let start = 1483225080;
		let leap = MinuteFrame::from_bits(0x105A5B1C6B3C0000);
		assert!(leap.leap_marker());
		let drives = drives(&log.lock().unwrap());
		assert_eq!(&drives[..expected(&leap, start).len()], &expected(&leap, start)[..]);

		// Second 59 is a 100ms reduced pulse, second 60 the unmodulated marker
		assert!(drives.contains(&(TimeSpec::at(start + 59), Level::Released)));
		assert!(drives.contains(&(TimeSpec::at(start + 59) + Milliseconds(100), Level::DrivenLow)));
		assert!(drives.contains(&(TimeSpec::at(start + 60), Level::DrivenLow)));

		// The following minute starts one second late
		let mut encoder = FrameEncoder::new();
		let (_, next) = frame_for(&mut encoder, start + 61 + 60, true).unwrap();
		assert!(!next.leap_marker());
		assert_eq!(&drives[expected(&leap, start).len()..], &expected(&next, start + 61)[..]);
	}

	#[test]
	fn stop_before_start_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		shutdown.signal_stop();
		let output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };

		transmission_worker(&config(5), &*clock, output, reference, &shutdown).unwrap();

		assert_eq!(*log.lock().unwrap(), vec![Event::Configure(Level::DrivenLow), Event::Release]);
		assert!(shutdown.should_stop_carrier());
	}

	#[test]
	fn stop_before_first_minute_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		{
			let shutdown = shutdown.clone();
			clock.at(TimeSpec::at(1716742660), move || {
				shutdown.signal_stop();
				None
			});
		}
		let output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };

		transmission_worker(&config(5), &*clock, output, reference, &shutdown).unwrap();

		// The stop lands 20 seconds before the first minute and ends the wait at once
		assert_eq!(*log.lock().unwrap(), vec![Event::Configure(Level::DrivenLow), Event::Release]);
		assert_eq!(clock.now().unwrap(), TimeSpec::at(1716742660));
		assert!(shutdown.should_stop_carrier());
	}

	#[test]
	fn stop_mid_minute_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		{
			let shutdown = shutdown.clone();
			clock.at(TimeSpec::at(1716742690), move || {
				shutdown.signal_stop();
				None
			});
		}
		let output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };

		transmission_worker(&config(5), &*clock, output, reference, &shutdown).unwrap();

		// The stop lands on the wakeup for second 10, so second 9 is the last one sent
		let log = log.lock().unwrap();
		let drives = drives(&log);
		assert_eq!(drives.last().unwrap().0.sec, 1716742689);
		assert_eq!(drives.last().unwrap().1, Level::DrivenLow);
		assert!(drives.iter().all(|(t, _)| t.sec < 1716742690));
		assert_eq!(log.last(), Some(&Event::Release));
		assert!(shutdown.should_stop_carrier());
	}

	#[test]
	fn late_second_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		// The clock steps forward by three seconds while waiting for second 5
		clock.jump(TimeSpec::at(1716742685), TimeSpec::at(1716742688) + Milliseconds(500));
		let mut output = RecordingOutput::new(clock.clone(), log.clone());
		let reference = TimeReference { sec: 1716742650, leap: false };

		transmit(&config(1), &*clock, &mut output, reference, &shutdown).unwrap();

		let drives = drives(&log.lock().unwrap());
		let seconds: Vec<i64> = drives.iter().map(|(t, _)| t.sec - 1716742680).collect();
		// Seconds 5 through 7 ended before the clock got there
		for skipped in 5..=7 {
			assert!(!seconds.contains(&skipped));
		}
		// Second 8 is already underway but still sent, at the time it was reached
		assert!(seconds.contains(&8));
		assert!(seconds.contains(&9));
		assert_eq!(drives.last(), Some(&(TimeSpec::at(1716742739), Level::DrivenLow)));
	}

	#[test]
	fn output_error_test() {
		let clock = VirtualClock::new(TimeSpec::at(1716742650));
		let log = event_log();
		let shutdown = Shutdown::new();
		let output = RecordingOutput::new(clock.clone(), log.clone()).failing_after(3);
		let reference = TimeReference { sec: 1716742650, leap: false };

		let err = transmission_worker(&config(1), &*clock, output, reference, &shutdown).unwrap_err();
		assert!(matches!(err, Error::Gpio(_)));

		let log = log.lock().unwrap();
		assert_eq!(drives(&log).len(), 3);
		assert_eq!(log.last(), Some(&Event::Release));
		assert_eq!(shutdown.exit_code(), crate::shutdown::WORKER_FINISHED);

		// Stopping the carrier still waits for the stop request
		assert!(!shutdown.should_stop_carrier());
		shutdown.signal_stop();
		assert!(shutdown.should_stop_carrier());
	}
}
