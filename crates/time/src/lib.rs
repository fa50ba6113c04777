//! Utilities for dealing with time.
//!
//! This crate is divided into two halves: [`time`] deals with Unix timestamps and UTC calendar
//! time, with no understanding of timezones; [`clock`] abstracts the wall clock that real-time
//! code reads and sleeps against, so timing logic can be driven by a virtual clock in tests.
//!
//! If the `now` feature is enabled, [`time::now`] and [`clock::SystemClock`] become available.
//! Both are backed by `libc` (`clock_gettime` and `clock_nanosleep` on `CLOCK_REALTIME`).
//!
//! # Examples
//!
//! Basic conversion from Unix time to UTC calendar time.
//! ```
//! # use time::time::Tm;
//! let date = Tm::new(1718617807).unwrap();
//! assert_eq!(date, Tm {
//! 	sec: 7,
//! 	min: 50,
//! 	hour: 9,
//! 	day: 17,
//! 	mon: 6,
//! 	year: 124,
//! 	wday: 1
//! });
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

pub mod time;
pub mod clock;

pub use time::*;
pub use clock::*;
