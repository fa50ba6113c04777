//! Support for getting the current time from an NTP server.
//!
//! This crate provides a single request/response exchange ([`query`]): one 48-byte client packet
//! goes out, and the server's transmit timestamp and leap indicator come back. If the address
//! resolves to multiple IPs, they are tried in order until one answers.
//!
//! Responses are validated before use. A short packet, a packet that is not from a server, or an
//! empty transmit timestamp is an [`NtpError`], never a default time.
//!
//! # Examples
//!
//! ```no_run
//! # use sntp::query;
//! match query("pool.ntp.org") {
//! 	Ok(t) => assert!(t.sec > 0),
//! 	Err(e) => eprintln!("Error querying pool.ntp.org: {e}")
//! }
//! assert!(query("").is_err());
//! ```

use std::{
	io,
	net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket},
	time::Duration
};
use thiserror::Error;
use tracing::{debug, warn};

/// Server used when none is configured.
pub const DEFAULT_SERVER: &str = "pool.ntp.org";

/// Offset to adjust an NTP timestamp (epoch Jan 1, 1900) to a Unix timestamp (epoch Jan 1, 1970).
const NTP_TO_UNIX_EPOCH_ADJUST: i64 = (70 * 365 + 17) * 86400; // 17 leap years between 1900-1970

/// Length of an NTP packet without extension fields.
const PACKET_LEN: usize = 48;

/// First byte of a client request: LI 0, version 4, mode 3 (client).
const CLIENT_REQUEST: u8 = 0x23;

/// Read and write timeout for a single exchange.
const TIMEOUT: Duration = Duration::from_secs(1);

/// The time reported by an NTP server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NtpTime {
	/// Server transmit time in seconds since the Unix epoch.
	pub sec: i64,
	/// Leap indicator, ranged [0, 3]. 1 and 2 announce a leap second at the end of the day, 3 means
	/// the server clock is unsynchronized.
	pub leap: u8
}

/// The error type for NTP queries.
#[derive(Debug, Error)]
pub enum NtpError {
	/// The server address was empty.
	#[error("empty NTP server address")]
	EmptyAddress,
	/// The server address could not be resolved.
	#[error("failed to resolve NTP server {addr}: {source}")]
	Resolve { addr: String, source: io::Error },
	/// The server address resolved to no IPs.
	#[error("NTP server {0} did not resolve to any IPs")]
	NoAddresses(String),
	/// Socket setup, send, or receive failed.
	#[error("NTP exchange failed: {0}")]
	Io(#[from] io::Error),
	/// The response was not a full NTP packet. The received length is the payload.
	#[error("invalid NTP response length: {0} bytes")]
	ShortResponse(usize),
	/// The response was not sent by a server. The received mode is the payload.
	#[error("unexpected NTP response mode: {0}")]
	BadMode(u8),
	/// The response carried no transmit timestamp.
	#[error("NTP response has an empty transmit timestamp")]
	ZeroTimestamp
}

/// Build a client request packet.
fn request() -> [u8; PACKET_LEN] {
	let mut packet = [0; PACKET_LEN];
	packet[0] = CLIENT_REQUEST;
	packet
}

/// Convert the 32-bit seconds of an NTP timestamp to Unix seconds.
///
/// NTP seconds roll over on February 7, 2036. Values with the top bit clear are taken to be in
/// the era after the rollover, since no server reports a time before 1968.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(ntp_to_unix(0x83AA7E80), 0);           // Jan 1, 1970
/// assert_eq!(ntp_to_unix(0x00000000), 2085978496);  // Feb 7, 2036 06:28:16
/// ```
fn ntp_to_unix(sec: u32) -> i64 {
	let mut sec = sec as i64;
	if sec & 0x8000_0000 == 0 {
		sec += 1 << 32;
	}
	sec - NTP_TO_UNIX_EPOCH_ADJUST
}

/// Validate and decode a server response.
///
/// # Errors
///
/// Returns [`NtpError::ShortResponse`] unless `buf` is exactly one packet, [`NtpError::BadMode`]
/// if the mode is not 4 (server) or 5 (broadcast), and [`NtpError::ZeroTimestamp`] if the
/// transmit timestamp is zero.
fn parse_response(buf: &[u8]) -> Result<NtpTime, NtpError> {
	if buf.len() != PACKET_LEN {
		return Err(NtpError::ShortResponse(buf.len()));
	}

	let mode = buf[0] & 0x7;
	if mode != 4 && mode != 5 {
		return Err(NtpError::BadMode(mode));
	}

	let tx_sec = u32::from_be_bytes([buf[40], buf[41], buf[42], buf[43]]);
	let tx_frac = u32::from_be_bytes([buf[44], buf[45], buf[46], buf[47]]);
	if tx_sec == 0 && tx_frac == 0 {
		return Err(NtpError::ZeroTimestamp);
	}

	Ok(NtpTime { sec: ntp_to_unix(tx_sec), leap: buf[0] >> 6 })
}

/// Normalize an address for use by [`ToSocketAddrs::to_socket_addrs`].
///
/// This function adds the default NTP port (123) if none is given, and supports domain names and
/// IP addresses (IPv4 and IPv6, bracketed or bare).
///
/// # Errors
///
/// Returns [`NtpError::EmptyAddress`] if `addr` is empty.
fn normalize_address(addr: &str) -> Result<String, NtpError> {
	if addr.is_empty() {
		return Err(NtpError::EmptyAddress);
	}

	if let Some(rest) = addr.strip_prefix('[') {
		// Bracketed IPv6, port optional after the closing bracket
		return match rest.find(']') {
			Some(i) if rest[i + 1..].starts_with(':') => Ok(String::from(addr)),
			_ => Ok(format!("{}:123", addr))
		};
	}

	match addr.matches(':').count() {
		0 => Ok(format!("{}:123", addr)),
		// host:port or IPv4:port
		1 => Ok(String::from(addr)),
		// Bare IPv6 never carries a port
		_ => Ok(format!("[{}]:123", addr))
	}
}

/// Run one exchange with the server at `addr`.
///
/// # Errors
///
/// Returns [`NtpError::Io`] for socket failures (including the one second timeout) and any of
/// the validation errors from [`parse_response`].
pub fn query_addr(addr: &SocketAddr) -> Result<NtpTime, NtpError> {
	let socket = if addr.is_ipv4() {
		UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?
	} else {
		UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?
	};
	socket.set_read_timeout(Some(TIMEOUT))?;
	socket.set_write_timeout(Some(TIMEOUT))?;
	socket.connect(addr)?;

	socket.send(&request())?;
	// One spare byte so oversized responses are detected rather than truncated
	let mut buf = [0; PACKET_LEN + 1];
	let len = socket.recv(&mut buf)?;
	parse_response(&buf[..len])
}

/// Get the current time according to an NTP server.
///
/// `server` may be a host name, `host:port`, an IPv4 address, or an IPv6 address (bare or in
/// brackets, optionally with a port). Every resolved address is tried in order and the first
/// valid answer is returned.
///
/// # Errors
///
/// Returns an error if the address is empty or does not resolve, or the error from the last
/// address tried if none returned a valid response.
pub fn query(server: &str) -> Result<NtpTime, NtpError> {
	let normalized = normalize_address(server)?;
	let addrs: Vec<SocketAddr> = normalized
		.to_socket_addrs()
		.map_err(|source| NtpError::Resolve { addr: String::from(server), source })?
		.collect();

	let mut last = NtpError::NoAddresses(String::from(server));
	for addr in &addrs {
		match query_addr(addr) {
			Ok(t) => {
				debug!(%addr, sec = t.sec, leap = t.leap, "NTP response");
				return Ok(t);
			}
			Err(e) => {
				warn!(%addr, error = %e, "NTP query failed");
				last = e;
			}
		}
	}

	Err(last)
}
