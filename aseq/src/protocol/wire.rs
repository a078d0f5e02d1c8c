//! Report layouts of the instrument's command protocol.
//!
//! ## Report format
//!
//! Every exchange moves fixed-size HID reports. Outbound reports carry a
//! leading zero report id in front of the 64 byte body; inbound reports are
//! the bare body:
//!
//! ```text
//! out:  +----+--------+---------------------+
//!       | 00 | opcode | fields, zero padded |
//!       +----+--------+---------------------+
//!       | 1  | 1      | 63                  |
//!
//! in:   +-------+----------------------------+
//!       | reply | fields or streamed payload |
//!       +-------+----------------------------+
//!       | 1     | 63                         |
//! ```
//!
//! Replies echo the request opcode with the high bit set. Streamed replies
//! (frame and flash reads) share one chunk layout:
//!
//! ```text
//!       +-------+--------+--------+-----------+------------------+
//!       | reply | off lo | off hi | remaining | payload, 60 bytes |
//!       +-------+--------+--------+-----------+------------------+
//! ```
//!
//! `off` locates the payload inside the current burst window. `remaining`
//! counts down the packets still owed for the burst; values of
//! [`COUNTDOWN_ERROR_FLOOR`] and above report a device-side failure instead.
//! All multi-byte fields are little-endian.

use byteorder::{LittleEndian, WriteBytesExt};
use std::time::Duration;

/// USB vendor id of the instrument.
pub const VENDOR_ID: u16 = 0xE220;
/// USB product id of the instrument.
pub const PRODUCT_ID: u16 = 0x0100;

/// Length of one inbound report body.
pub const REPORT_LEN: usize = 64;
/// Length of one outbound report, report id byte included.
pub const OUT_REPORT_LEN: usize = REPORT_LEN + 1;

/// Pixels carried by one streamed frame packet.
pub const PIXELS_PER_PACKET: usize = 30;
/// Flash bytes carried by one streamed flash packet.
pub const FLASH_BYTES_PER_PACKET: usize = REPORT_LEN - 4;
/// Largest packet count one frame request may ask for.
pub const MAX_FRAME_PACKETS: u8 = 124;
/// Largest packet count one flash read request may ask for.
pub const MAX_FLASH_READ_PACKETS: u8 = 100;
/// Largest payload of one flash write chunk.
pub const MAX_FLASH_WRITE_PAYLOAD: usize = 58;
/// Countdown values at or above this report a device-side error.
pub const COUNTDOWN_ERROR_FLOOR: u8 = 250;

/// Total flash size in bytes.
pub const FLASH_SIZE: u32 = 0x20000;
/// Frame index addressing the averaged spectrum instead of a stored frame.
pub const AVERAGED_FRAME: u16 = 0xFFFF;

/// Read timeout for ordinary exchanges.
pub const STANDARD_TIMEOUT: Duration = Duration::from_millis(100);
/// Read timeout for the whole-chip flash erase.
pub const ERASE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Request opcodes understood by the instrument.
///
/// The software trigger, reset, and detach requests are write-only; the
/// instrument sends nothing back for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Query the status word.
    Status = 0x01,
    /// Set the exposure time.
    SetExposure = 0x02,
    /// Set scan counts, scan mode, and exposure.
    SetAcquisition = 0x03,
    /// Set the active element window and reduction.
    SetFrameFormat = 0x04,
    /// Arm or disarm the external trigger input.
    SetExternalTrigger = 0x05,
    /// Start an acquisition from software.
    SoftwareTrigger = 0x06,
    /// Drop all stored frames.
    ClearMemory = 0x07,
    /// Query the active element window.
    GetFrameFormat = 0x08,
    /// Query scan counts, scan mode, and exposure.
    GetAcquisition = 0x09,
    /// Stream one stored frame.
    GetFrame = 0x0A,
    /// Arm or disarm the light-level trigger.
    SetOpticalTrigger = 0x0B,
    /// Set every acquisition and trigger parameter at once.
    SetAllParameters = 0x0C,
    /// Stream a span of flash bytes.
    ReadFlash = 0x1A,
    /// Write one flash chunk.
    WriteFlash = 0x1B,
    /// Erase the whole flash.
    EraseFlash = 0x1C,
    /// Reboot the firmware with default parameters.
    Reset = 0xF1,
    /// Drop off the bus until replugged.
    Detach = 0xF2,
}

/// Outbound report builder.
///
/// Owns the full buffer handed to the transport: the leading zero report id,
/// the opcode, and the request fields, zero padded to the report length.
#[derive(Debug, Clone)]
pub struct Request {
    buf: [u8; OUT_REPORT_LEN],
}

impl Request {
    fn new(opcode: Opcode) -> Self {
        let mut buf = [0u8; OUT_REPORT_LEN];
        buf[1] = opcode as u8;
        Self { buf }
    }

    #[allow(clippy::unwrap_used)] // Writing within the fixed buffer cannot fail
    fn put_u16(&mut self, at: usize, value: u16) {
        (&mut self.buf[at..at + 2])
            .write_u16::<LittleEndian>(value)
            .unwrap();
    }

    #[allow(clippy::unwrap_used)] // Writing within the fixed buffer cannot fail
    fn put_u32(&mut self, at: usize, value: u32) {
        (&mut self.buf[at..at + 4])
            .write_u32::<LittleEndian>(value)
            .unwrap();
    }

    /// Status query.
    pub fn status() -> Self {
        Self::new(Opcode::Status)
    }

    /// Exposure update. `exposure` is in 10 microsecond steps; `force`
    /// applies it to an acquisition already in progress.
    pub fn set_exposure(exposure: u32, force: bool) -> Self {
        let mut req = Self::new(Opcode::SetExposure);
        req.put_u32(2, exposure);
        req.buf[6] = u8::from(force);
        req
    }

    /// Scan counts, scan mode, and exposure in one request.
    pub fn set_acquisition(scans: u16, blank_scans: u16, mode: u8, exposure: u32) -> Self {
        let mut req = Self::new(Opcode::SetAcquisition);
        req.put_u16(2, scans);
        req.put_u16(4, blank_scans);
        req.buf[6] = mode;
        req.put_u32(7, exposure);
        req
    }

    /// Active element window and reduction.
    pub fn set_frame_format(start: u16, end: u16, reduction: u8) -> Self {
        let mut req = Self::new(Opcode::SetFrameFormat);
        req.put_u16(2, start);
        req.put_u16(4, end);
        req.buf[6] = reduction;
        req
    }

    /// External trigger arming.
    pub fn set_external_trigger(mode: u8, edge: u8) -> Self {
        let mut req = Self::new(Opcode::SetExternalTrigger);
        req.buf[2] = mode;
        req.buf[3] = edge;
        req
    }

    /// Software trigger. Write-only.
    pub fn software_trigger() -> Self {
        Self::new(Opcode::SoftwareTrigger)
    }

    /// Frame memory clear.
    pub fn clear_memory() -> Self {
        Self::new(Opcode::ClearMemory)
    }

    /// Element window query.
    pub fn get_frame_format() -> Self {
        Self::new(Opcode::GetFrameFormat)
    }

    /// Acquisition parameter query.
    pub fn get_acquisition() -> Self {
        Self::new(Opcode::GetAcquisition)
    }

    /// Burst request for one stored frame.
    ///
    /// `offset` is the first pixel to stream, `frame` the stored frame index
    /// or [`AVERAGED_FRAME`], `packets` the burst budget.
    pub fn get_frame(offset: u16, frame: u16, packets: u8) -> Self {
        let mut req = Self::new(Opcode::GetFrame);
        req.put_u16(2, offset);
        req.put_u16(4, frame);
        req.buf[6] = packets;
        req
    }

    /// Light-level trigger arming on one watched element.
    pub fn set_optical_trigger(mode: u8, pixel: u16, threshold: u16) -> Self {
        let mut req = Self::new(Opcode::SetOpticalTrigger);
        req.buf[2] = mode;
        req.put_u16(3, pixel);
        req.put_u16(5, threshold);
        req
    }

    /// Every acquisition and trigger parameter in one request.
    pub fn set_all_parameters(
        scans: u16,
        blank_scans: u16,
        mode: u8,
        exposure: u32,
        trigger_mode: u8,
        trigger_edge: u8,
    ) -> Self {
        let mut req = Self::new(Opcode::SetAllParameters);
        req.put_u16(2, scans);
        req.put_u16(4, blank_scans);
        req.buf[6] = mode;
        req.put_u32(7, exposure);
        req.buf[11] = trigger_mode;
        req.buf[12] = trigger_edge;
        req
    }

    /// Burst request for a span of flash bytes.
    pub fn read_flash(offset: u32, packets: u8) -> Self {
        let mut req = Self::new(Opcode::ReadFlash);
        req.put_u32(2, offset);
        req.buf[6] = packets;
        req
    }

    /// One flash write chunk. `chunk` must not exceed
    /// [`MAX_FLASH_WRITE_PAYLOAD`] bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_flash(offset: u32, chunk: &[u8]) -> Self {
        debug_assert!(chunk.len() <= MAX_FLASH_WRITE_PAYLOAD);
        let mut req = Self::new(Opcode::WriteFlash);
        req.put_u32(2, offset);
        req.buf[6] = chunk.len() as u8;
        req.buf[7..7 + chunk.len()].copy_from_slice(chunk);
        req
    }

    /// Whole-chip flash erase.
    pub fn erase_flash() -> Self {
        Self::new(Opcode::EraseFlash)
    }

    /// Firmware reset. Write-only.
    pub fn reset() -> Self {
        Self::new(Opcode::Reset)
    }

    /// Bus detach. Write-only.
    pub fn detach() -> Self {
        Self::new(Opcode::Detach)
    }

    /// The request opcode byte.
    pub fn opcode(&self) -> u8 {
        self.buf[1]
    }

    /// Reply code this request is answered with.
    pub fn reply_code(&self) -> u8 {
        self.buf[1] | 0x80
    }

    /// The full outbound report, report id included.
    pub fn as_bytes(&self) -> &[u8; OUT_REPORT_LEN] {
        &self.buf
    }
}

/// One streamed reply packet, split into bookkeeping fields and payload.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Payload position inside the current burst window, in payload units.
    pub local_offset: u16,
    /// Packets still owed for the burst, or an error sentinel.
    pub remaining: u8,
    /// The raw payload bytes.
    pub payload: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Split a streamed reply body. Returns `None` when the body is shorter
    /// than the chunk header.
    pub fn parse(body: &'a [u8]) -> Option<Self> {
        if body.len() < 4 {
            return None;
        }
        Some(Self {
            local_offset: u16::from_le_bytes([body[1], body[2]]),
            remaining: body[3],
            payload: &body[4..],
        })
    }

    /// The payload decoded as little-endian pixels.
    pub fn pixels(&self) -> impl Iterator<Item = u16> + 'a {
        self.payload
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }
}
