//! # aseq
//!
//! A library for driving ASEQ USB spectrometers.
//!
//! This crate speaks the instruments' USB HID protocol directly, without a
//! vendor SDK, including:
//!
//! - Device discovery and session management with automatic reconnects
//! - Acquisition control: exposure, scan counts, scan modes, triggers
//! - Frame pulls reassembled from streamed HID packets
//! - Calibration flash access (read, write, erase)
//!
//! ## Supported Platforms
//!
//! Linux, macOS and Windows via the `hidapi` crate. No kernel driver is
//! needed; the instruments enumerate as plain HID devices.
//!
//! ## Features
//!
//! - `serde`: Serialization support for parameter and status types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::{thread, time::Duration};
//!
//! fn main() -> aseq::Result<()> {
//!     let mut dev = aseq::Spectrometer::open_first()?;
//!
//!     // 30 ms exposure, in 10 us steps.
//!     dev.set_exposure(3_000, false)?;
//!     dev.trigger()?;
//!     while dev.status()?.in_progress() {
//!         thread::sleep(Duration::from_millis(20));
//!     }
//!
//!     let width = usize::from(dev.frame_pixels()?);
//!     let mut pixels = vec![0u16; width];
//!     dev.read_frame(&mut pixels, 0)?;
//!     println!("peak count: {}", pixels.iter().max().unwrap());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod params;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use {
    device::Spectrometer,
    error::{Error, Result},
    params::{
        AcquisitionParams, AveragingStatus, ExternalTriggerMode, FrameFormat,
        LEADING_SERVICE_ELEMENTS, OpticalTriggerMode, ReductionMode, ScanMode, Status,
        TRAILING_SERVICE_ELEMENTS, TriggerEdge,
    },
    protocol::wire::{AVERAGED_FRAME, FLASH_SIZE, PRODUCT_ID, VENDOR_ID},
    transport::{DeviceInfo, Transport, hid::HidTransport},
};
