//! Transport abstraction over the instrument's fixed-size report link.
//!
//! The protocol engine only moves whole reports, so the seam between it and
//! the operating system is small:
//!
//! ```text
//!   +--------------------------+
//!   |  Spectrometer (session)  |
//!   +--------------------------+
//!                |
//!         trait Transport
//!                |
//!       +--------+--------+
//!       |                 |
//! +-----------+   +----------------+
//! | HID (usb) |   | scripted mock  |
//! +-----------+   |  (tests only)  |
//! +-----------+   +----------------+
//! ```
//!
//! [`hid::HidTransport`] is the production implementation; tests drive the
//! session against a scripted transport instead of hardware.

pub mod hid;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use crate::protocol::wire::{OUT_REPORT_LEN, REPORT_LEN};
use std::time::Duration;

/// Identity of one enumerated instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeviceInfo {
    /// Serial number string, if the descriptor carries one.
    pub serial: Option<String>,
    /// Manufacturer string, if the descriptor carries one.
    pub manufacturer: Option<String>,
    /// Product string, if the descriptor carries one.
    pub product: Option<String>,
}

/// One report channel to one instrument.
///
/// A write hands the link the full outbound report and returns the byte
/// count the link accepted; a read fills the inbound body and returns the
/// byte count actually delivered within `timeout`. Short counts are passed
/// through as `Ok`, the session layer decides what they mean.
pub trait Transport {
    /// Write one outbound report.
    fn write_report(&mut self, report: &[u8; OUT_REPORT_LEN]) -> Result<usize>;

    /// Read one inbound report body, waiting at most `timeout`.
    fn read_report(&mut self, body: &mut [u8; REPORT_LEN], timeout: Duration) -> Result<usize>;

    /// Whether a live handle is currently held.
    fn is_open(&self) -> bool;

    /// Drop any stale handle and open the instrument again.
    ///
    /// With a serial, only that unit matches; without one, the first
    /// enumerated instrument is taken.
    fn reopen(&mut self, serial: Option<&str>) -> Result<()>;
}
