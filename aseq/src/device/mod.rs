//! Spectrometer session: lifecycle, reconnect policy, and the command
//! surface built from single write-then-read exchanges.

mod transfer;

use log::{debug, info, trace, warn};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::params::{
    AcquisitionParams, ExternalTriggerMode, FrameFormat, OpticalTriggerMode, ReductionMode,
    ScanMode, Status, TriggerEdge,
};
use crate::protocol::wire::{self, Request};
use crate::transport::hid::HidTransport;
use crate::transport::{DeviceInfo, Transport};

/// Session with one spectrometer.
///
/// The session owns its transport; dropping it closes the device handle.
/// All protocol logic lives here, generic over [`Transport`], so tests can
/// drive it against a scripted link instead of hardware.
///
/// Commands are synchronous and take `&mut self`; the instrument answers one
/// request at a time.
pub struct Spectrometer<T: Transport> {
    transport: T,
    /// Serial the session reconnects to. `None` reconnects to any unit.
    serial: Option<String>,
    /// Pixels per frame as last reported by the device. Zero means unknown.
    frame_pixels: u16,
}

impl Spectrometer<HidTransport> {
    /// List every connected spectrometer.
    pub fn devices() -> Result<Vec<DeviceInfo>> {
        HidTransport::enumerate()
    }

    /// Open the spectrometer with the given serial number.
    pub fn open_by_serial(serial: &str) -> Result<Self> {
        let transport = HidTransport::open(Some(serial))?;
        info!("connected to spectrometer {serial}");
        Ok(Self::with_transport(transport, Some(serial.to_owned())))
    }

    /// Open the `index`th enumerated spectrometer, counting from zero.
    ///
    /// The unit's serial is resolved from the enumeration first, so a later
    /// reconnect finds the same physical instrument even if the enumeration
    /// order has changed.
    pub fn open_at(index: usize) -> Result<Self> {
        let devices = Self::devices()?;
        let serial = devices
            .get(index)
            .ok_or(Error::DeviceNotFound)?
            .serial
            .clone();
        let transport = HidTransport::open(serial.as_deref())?;
        info!(
            "connected to spectrometer {} at index {index}",
            serial.as_deref().unwrap_or("<no serial>")
        );
        Ok(Self::with_transport(transport, serial))
    }

    /// Open the first enumerated spectrometer.
    pub fn open_first() -> Result<Self> {
        Self::open_at(0)
    }
}

impl<T: Transport> Spectrometer<T> {
    /// Build a session over an already-open transport.
    pub fn with_transport(transport: T, serial: Option<String>) -> Self {
        Self {
            transport,
            serial,
            frame_pixels: 0,
        }
    }

    /// Serial number this session reconnects to, if any.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Frame width last reported by the device, if it has reported one.
    pub fn cached_frame_pixels(&self) -> Option<u16> {
        (self.frame_pixels != 0).then_some(self.frame_pixels)
    }

    // ---- transport plumbing ----

    fn reconnect(&mut self) -> Result<()> {
        warn!(
            "reconnecting to spectrometer {}",
            self.serial.as_deref().unwrap_or("<any>")
        );
        self.transport.reopen(self.serial.as_deref())
    }

    /// Reconnect if the handle was lost, for example after a detach.
    fn ensure_open(&mut self) -> Result<()> {
        if self.transport.is_open() {
            return Ok(());
        }
        self.reconnect()
    }

    /// Write one request, with a single reconnect-and-retry on failure.
    ///
    /// Anything other than a full-length write counts as a failure. The
    /// first failure reconnects and retries once; the second fails the call.
    fn try_write(&mut self, request: &Request) -> Result<()> {
        let mut reconnected = false;
        loop {
            match self.transport.write_report(request.as_bytes()) {
                Ok(written) if written == wire::OUT_REPORT_LEN => {
                    trace!("sent request {:#04x}", request.opcode());
                    return Ok(());
                }
                Ok(written) => {
                    warn!("short report write: {written} of {} bytes", wire::OUT_REPORT_LEN);
                }
                Err(e) => warn!("report write failed: {e}"),
            }
            if reconnected {
                return Err(Error::WriteFailed);
            }
            self.reconnect()?;
            reconnected = true;
        }
    }

    /// Read one reply body and check its leading code byte.
    fn read_reply(&mut self, reply: u8, timeout: Duration) -> Result<[u8; wire::REPORT_LEN]> {
        let mut body = [0u8; wire::REPORT_LEN];
        let read = self.transport.read_report(&mut body, timeout).map_err(|e| {
            debug!("report read failed: {e}");
            Error::ReadFailed
        })?;
        if read != wire::REPORT_LEN {
            debug!("short report read: {read} of {} bytes", wire::REPORT_LEN);
            return Err(Error::ReadFailed);
        }
        if body[0] != reply {
            return Err(Error::UnexpectedReply {
                expected: reply,
                actual: body[0],
            });
        }
        Ok(body)
    }

    /// One write-then-read exchange.
    fn exchange(&mut self, request: &Request, timeout: Duration) -> Result<[u8; wire::REPORT_LEN]> {
        self.ensure_open()?;
        self.try_write(request)?;
        self.read_reply(request.reply_code(), timeout)
    }

    /// Exchange that the device acknowledges with an error byte.
    fn command(&mut self, request: &Request, timeout: Duration) -> Result<[u8; wire::REPORT_LEN]> {
        let body = self.exchange(request, timeout)?;
        match body[1] {
            0 => Ok(body),
            code => Err(Error::Device(code)),
        }
    }

    /// One write with no reply to wait for.
    fn send_only(&mut self, request: &Request) -> Result<()> {
        self.ensure_open()?;
        self.try_write(request)
    }

    // ---- command surface ----

    /// Query the device status word.
    pub fn status(&mut self) -> Result<Status> {
        let body = self.exchange(&Request::status(), wire::STANDARD_TIMEOUT)?;
        let status = Status {
            flags: body[1],
            frames_in_memory: u16::from_le_bytes([body[2], body[3]]),
        };
        trace!("status: {status:?}");
        Ok(status)
    }

    /// Set the exposure time, in 10 microsecond steps.
    ///
    /// With `force` the new exposure also applies to an acquisition already
    /// in progress.
    pub fn set_exposure(&mut self, exposure: u32, force: bool) -> Result<()> {
        debug!("set exposure to {exposure} x 10us (force: {force})");
        self.command(&Request::set_exposure(exposure, force), wire::STANDARD_TIMEOUT)?;
        Ok(())
    }

    /// Set scan counts, scan mode, and exposure in one call.
    pub fn set_acquisition(&mut self, params: &AcquisitionParams) -> Result<()> {
        debug!("set acquisition parameters: {params:?}");
        self.command(
            &Request::set_acquisition(
                params.scans,
                params.blank_scans,
                params.mode.wire(),
                params.exposure,
            ),
            wire::STANDARD_TIMEOUT,
        )?;
        Ok(())
    }

    /// Read back scan counts, scan mode, and exposure.
    pub fn acquisition(&mut self) -> Result<AcquisitionParams> {
        let body = self.exchange(&Request::get_acquisition(), wire::STANDARD_TIMEOUT)?;
        Ok(AcquisitionParams {
            scans: u16::from_le_bytes([body[1], body[2]]),
            blank_scans: u16::from_le_bytes([body[3], body[4]]),
            mode: ScanMode::from_wire(body[5])?,
            exposure: u32::from_le_bytes([body[6], body[7], body[8], body[9]]),
        })
    }

    /// Set the active element window and on-sensor reduction.
    ///
    /// Returns the resulting frame width and refreshes the cached one.
    pub fn set_frame_format(
        &mut self,
        start_element: u16,
        end_element: u16,
        reduction: ReductionMode,
    ) -> Result<u16> {
        debug!("set frame format: elements {start_element}..={end_element}, {reduction:?}");
        let body = self.command(
            &Request::set_frame_format(start_element, end_element, reduction.wire()),
            wire::STANDARD_TIMEOUT,
        )?;
        let pixels = u16::from_le_bytes([body[2], body[3]]);
        self.frame_pixels = pixels;
        Ok(pixels)
    }

    /// Query the active element window; refreshes the cached frame width.
    pub fn frame_format(&mut self) -> Result<FrameFormat> {
        let body = self.exchange(&Request::get_frame_format(), wire::STANDARD_TIMEOUT)?;
        let format = FrameFormat {
            start_element: u16::from_le_bytes([body[1], body[2]]),
            end_element: u16::from_le_bytes([body[3], body[4]]),
            reduction: ReductionMode::from_wire(body[5])?,
            pixels_per_frame: u16::from_le_bytes([body[6], body[7]]),
        };
        self.frame_pixels = format.pixels_per_frame;
        Ok(format)
    }

    /// Arm or disarm the external trigger input.
    pub fn set_external_trigger(
        &mut self,
        mode: ExternalTriggerMode,
        edge: TriggerEdge,
    ) -> Result<()> {
        debug!("set external trigger: {mode:?} on {edge:?} edge");
        self.command(
            &Request::set_external_trigger(mode.wire(), edge.wire()),
            wire::STANDARD_TIMEOUT,
        )?;
        Ok(())
    }

    /// Arm or disarm the light-level trigger on one watched element.
    pub fn set_optical_trigger(
        &mut self,
        mode: OpticalTriggerMode,
        pixel: u16,
        threshold: u16,
    ) -> Result<()> {
        debug!("set optical trigger: {mode:?} on element {pixel}, threshold {threshold}");
        self.command(
            &Request::set_optical_trigger(mode.wire(), pixel, threshold),
            wire::STANDARD_TIMEOUT,
        )?;
        Ok(())
    }

    /// Set every acquisition and trigger parameter in one exchange.
    pub fn set_all_parameters(
        &mut self,
        params: &AcquisitionParams,
        trigger: ExternalTriggerMode,
        edge: TriggerEdge,
    ) -> Result<()> {
        debug!("set all parameters: {params:?}, trigger {trigger:?} on {edge:?} edge");
        self.command(
            &Request::set_all_parameters(
                params.scans,
                params.blank_scans,
                params.mode.wire(),
                params.exposure,
                trigger.wire(),
                edge.wire(),
            ),
            wire::STANDARD_TIMEOUT,
        )?;
        Ok(())
    }

    /// Start an acquisition from software.
    pub fn trigger(&mut self) -> Result<()> {
        debug!("software trigger");
        self.send_only(&Request::software_trigger())
    }

    /// Drop every frame stored in device memory.
    pub fn clear_memory(&mut self) -> Result<()> {
        debug!("clear frame memory");
        self.command(&Request::clear_memory(), wire::STANDARD_TIMEOUT)?;
        Ok(())
    }

    /// Reboot the firmware with default parameters.
    ///
    /// The device re-enumerates afterwards; the next command reconnects.
    pub fn reset(&mut self) -> Result<()> {
        info!("resetting spectrometer");
        self.send_only(&Request::reset())
    }

    /// Drop the device off the bus until it is replugged.
    pub fn detach(&mut self) -> Result<()> {
        info!("detaching spectrometer from the bus");
        self.send_only(&Request::detach())
    }
}
