//! HID transport backed by the `hidapi` crate.

use hidapi::{HidApi, HidDevice};
use log::{debug, trace};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::wire::{OUT_REPORT_LEN, PRODUCT_ID, REPORT_LEN, VENDOR_ID};
use crate::transport::{DeviceInfo, Transport};

/// HID report channel to one instrument.
///
/// Keeps its `HidApi` context for the whole transport lifetime so reconnects
/// reuse it instead of re-initialising the HID backend. Dropping the
/// transport closes the device handle.
pub struct HidTransport {
    api: HidApi,
    device: Option<HidDevice>,
}

impl HidTransport {
    /// Open the instrument with the given serial, or the first enumerated
    /// one when `serial` is `None`.
    ///
    /// Fails with [`Error::DeviceNotFound`] when enumeration shows no match,
    /// and with [`Error::Hid`] when the match exists but cannot be opened.
    pub fn open(serial: Option<&str>) -> Result<Self> {
        let api = HidApi::new()?;
        let known = instruments(&api);
        let listed = match serial {
            Some(serial) => known.iter().any(|d| d.serial.as_deref() == Some(serial)),
            None => !known.is_empty(),
        };
        if !listed {
            return Err(Error::DeviceNotFound);
        }

        let mut transport = Self { api, device: None };
        transport.reopen(serial)?;
        Ok(transport)
    }

    /// List every enumerated instrument.
    pub fn enumerate() -> Result<Vec<DeviceInfo>> {
        let api = HidApi::new()?;
        Ok(instruments(&api))
    }
}

/// Filter an enumeration down to this instrument's vendor and product id.
fn instruments(api: &HidApi) -> Vec<DeviceInfo> {
    api.device_list()
        .filter(|d| d.vendor_id() == VENDOR_ID && d.product_id() == PRODUCT_ID)
        .map(|d| DeviceInfo {
            serial: d.serial_number().map(str::to_owned),
            manufacturer: d.manufacturer_string().map(str::to_owned),
            product: d.product_string().map(str::to_owned),
        })
        .collect()
}

impl Transport for HidTransport {
    fn write_report(&mut self, report: &[u8; OUT_REPORT_LEN]) -> Result<usize> {
        match &self.device {
            Some(device) => {
                let written = device.write(report)?;
                trace!("wrote {written} of {} report bytes", report.len());
                Ok(written)
            }
            None => Err(Error::WriteFailed),
        }
    }

    fn read_report(&mut self, body: &mut [u8; REPORT_LEN], timeout: Duration) -> Result<usize> {
        match &self.device {
            Some(device) => {
                #[allow(clippy::cast_possible_truncation)]
                let millis = timeout.as_millis().min(i32::MAX as u128) as i32;
                let read = device.read_timeout(body, millis)?;
                trace!("read {read} report bytes");
                Ok(read)
            }
            None => Err(Error::ReadFailed),
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn reopen(&mut self, serial: Option<&str>) -> Result<()> {
        // Release the stale handle before opening its replacement.
        self.device = None;

        let device = match serial {
            Some(serial) => self.api.open_serial(VENDOR_ID, PRODUCT_ID, serial)?,
            None => self.api.open(VENDOR_ID, PRODUCT_ID)?,
        };
        debug!("opened instrument {}", serial.unwrap_or("<any>"));
        self.device = Some(device);
        Ok(())
    }
}
