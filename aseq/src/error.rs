//! Error types for spectrometer operations.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to a spectrometer.
#[derive(Debug, Error)]
pub enum Error {
    /// Error reported by the HID backend.
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// No instrument matched the requested serial number or index.
    #[error("no matching spectrometer found")]
    DeviceNotFound,

    /// A report write stayed short or failed even after one reconnect.
    #[error("report write failed")]
    WriteFailed,

    /// A report read timed out, failed, or returned a short report.
    #[error("report read failed or timed out")]
    ReadFailed,

    /// The reply carried a code byte other than the one the request maps to.
    #[error("unexpected reply code {actual:#04x}, expected {expected:#04x}")]
    UnexpectedReply {
        /// Code the request is documented to produce.
        expected: u8,
        /// Code byte actually received.
        actual: u8,
    },

    /// A streamed packet's countdown disagreed with the burst bookkeeping.
    #[error("device reported {reported} remaining packets, expected {expected}")]
    RemainingPackets {
        /// Packets still owed after the one just received.
        expected: u8,
        /// Countdown value (or error sentinel) the device sent.
        reported: u8,
    },

    /// One frame would need more packets than a single burst may request.
    #[error("frame needs {packets} packets, device limit is {max}")]
    FrameTooLarge {
        /// Packets required to carry the full frame.
        packets: usize,
        /// Largest packet count one burst may request.
        max: u8,
    },

    /// The destination buffer cannot hold a full frame.
    #[error("destination holds {len} elements, {needed} required")]
    BufferTooSmall {
        /// Elements one full frame occupies.
        needed: usize,
        /// Elements the caller provided.
        len: usize,
    },

    /// A flash access reaches past the end of the flash array.
    #[error("flash range {offset:#x}+{len:#x} exceeds the {size:#x} byte flash")]
    FlashRange {
        /// First byte address of the access.
        offset: u32,
        /// Length of the access in bytes.
        len: usize,
        /// Total flash size in bytes.
        size: u32,
    },

    /// The instrument acknowledged the command with a non-zero error code.
    #[error("device rejected the command with code {0}")]
    Device(u8),

    /// A reply field held a value outside its documented range.
    #[error("protocol error: {0}")]
    Protocol(String),
}
