//! Typed acquisition, trigger, and status parameters.
//!
//! Each enum maps one-to-one onto a request byte. Reply bytes outside an
//! enum's documented set surface as [`Error::Protocol`] instead of panicking,
//! since firmware revisions may grow new values.

use crate::error::{Error, Result};

/// Leading service elements of a full default-geometry frame.
///
/// The sensor pads its 3648 active elements with dark and dummy elements on
/// both sides; a full frame carries them all.
pub const LEADING_SERVICE_ELEMENTS: usize = 32;

/// Trailing service elements of a full default-geometry frame.
pub const TRAILING_SERVICE_ELEMENTS: usize = 14;

/// How the sensor captures frames once an acquisition is triggered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ScanMode {
    /// Capture frames back to back.
    #[default]
    Continuous = 0,
    /// Idle the sensor until the first frame starts.
    FirstFrameIdle = 1,
    /// Idle the sensor before every frame.
    EveryFrameIdle = 2,
    /// Average all scans of the acquisition into one stored spectrum.
    FrameAveraging = 3,
}

impl ScanMode {
    /// Decode the wire byte.
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Continuous),
            1 => Ok(Self::FirstFrameIdle),
            2 => Ok(Self::EveryFrameIdle),
            3 => Ok(Self::FrameAveraging),
            other => Err(Error::Protocol(format!("unknown scan mode {other}"))),
        }
    }

    /// Encode for the wire.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// On-sensor averaging of adjacent elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ReductionMode {
    /// Report every element unchanged.
    #[default]
    None = 0,
    /// Average pairs of adjacent elements.
    AverageOf2 = 1,
    /// Average groups of four adjacent elements.
    AverageOf4 = 2,
    /// Average groups of eight adjacent elements.
    AverageOf8 = 3,
}

impl ReductionMode {
    /// Decode the wire byte.
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::AverageOf2),
            2 => Ok(Self::AverageOf4),
            3 => Ok(Self::AverageOf8),
            other => Err(Error::Protocol(format!("unknown reduction mode {other}"))),
        }
    }

    /// Encode for the wire.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// Arming state of the external trigger input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ExternalTriggerMode {
    /// Ignore the trigger input.
    #[default]
    Disabled = 0,
    /// Start an acquisition on every matching edge.
    Enabled = 1,
    /// Start one acquisition on the next matching edge, then disarm.
    OneTime = 2,
}

impl ExternalTriggerMode {
    /// Decode the wire byte.
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::Enabled),
            2 => Ok(Self::OneTime),
            other => Err(Error::Protocol(format!("unknown trigger mode {other}"))),
        }
    }

    /// Encode for the wire.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// Signal edge the external trigger input reacts to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TriggerEdge {
    /// React to no edge at all.
    #[default]
    None = 0,
    /// React to rising edges.
    Rising = 1,
    /// React to falling edges.
    Falling = 2,
    /// React to both edges.
    Both = 3,
}

impl TriggerEdge {
    /// Decode the wire byte.
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Rising),
            2 => Ok(Self::Falling),
            3 => Ok(Self::Both),
            other => Err(Error::Protocol(format!("unknown trigger edge {other}"))),
        }
    }

    /// Encode for the wire.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// Arming state of the light-level trigger.
///
/// The one-time variants occupy a separate code page; they disarm after the
/// first acquisition they start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OpticalTriggerMode {
    /// Ignore the light level.
    #[default]
    Disabled = 0,
    /// Trigger when the watched element falls through the threshold.
    FallingEdge = 1,
    /// Trigger while the watched element stays above the threshold.
    OnThreshold = 2,
    /// Trigger once when the watched element rises through the threshold.
    OneTimeRisingEdge = 0x81,
    /// Trigger once when the watched element falls through the threshold.
    OneTimeFallingEdge = 0x82,
}

impl OpticalTriggerMode {
    /// Decode the wire byte.
    pub fn from_wire(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Disabled),
            1 => Ok(Self::FallingEdge),
            2 => Ok(Self::OnThreshold),
            0x81 => Ok(Self::OneTimeRisingEdge),
            0x82 => Ok(Self::OneTimeFallingEdge),
            other => Err(Error::Protocol(format!(
                "unknown optical trigger mode {other:#04x}"
            ))),
        }
    }

    /// Encode for the wire.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// Scan counts, scan mode, and exposure of one acquisition.
///
/// Exposure is carried in the instrument's native 10 microsecond steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AcquisitionParams {
    /// Frames to capture per acquisition.
    pub scans: u16,
    /// Blank frames discarded before the captured ones.
    pub blank_scans: u16,
    /// Capture mode.
    pub mode: ScanMode,
    /// Exposure time in 10 microsecond steps.
    pub exposure: u32,
}

impl AcquisitionParams {
    /// Exposure time in microseconds.
    pub fn exposure_micros(&self) -> u64 {
        u64::from(self.exposure) * 10
    }
}

/// Active element window and reduction, as reported by the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameFormat {
    /// First active sensor element.
    pub start_element: u16,
    /// Last active sensor element.
    pub end_element: u16,
    /// On-sensor reduction applied to the window.
    pub reduction: ReductionMode,
    /// Elements one frame occupies after reduction, service elements included.
    pub pixels_per_frame: u16,
}

/// Device status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Status {
    /// Raw status flag byte.
    pub flags: u8,
    /// Frames currently held in device memory.
    ///
    /// In frame averaging mode this field carries an [`AveragingStatus`]
    /// code instead of a count.
    pub frames_in_memory: u16,
}

/// Acquisition-in-progress flag.
const FLAG_IN_PROGRESS: u8 = 0x01;
/// Frame-memory-full flag.
const FLAG_MEMORY_FULL: u8 = 0x02;

impl Status {
    /// Whether an acquisition is currently running.
    pub fn in_progress(&self) -> bool {
        self.flags & FLAG_IN_PROGRESS != 0
    }

    /// Whether the frame memory is full.
    pub fn memory_full(&self) -> bool {
        self.flags & FLAG_MEMORY_FULL != 0
    }

    /// Readiness of the averaged spectrum.
    ///
    /// Only meaningful in [`ScanMode::FrameAveraging`], where the frame count
    /// field doubles as a readiness code.
    pub fn averaging(&self) -> Result<AveragingStatus> {
        AveragingStatus::from_wire(self.frames_in_memory)
    }
}

/// Readiness of the averaged spectrum in frame averaging mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum AveragingStatus {
    /// The averaged spectrum is still accumulating.
    NotReady = 0,
    /// The averaged spectrum is ready.
    Ready = 1,
    /// The averaged spectrum is ready but frames were lost while averaging.
    ReadyFramesLost = 2,
}

impl AveragingStatus {
    /// Decode the frame count field.
    pub fn from_wire(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::NotReady),
            1 => Ok(Self::Ready),
            2 => Ok(Self::ReadyFramesLost),
            other => Err(Error::Protocol(format!("unknown averaging status {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_mode_wire_roundtrip() {
        for mode in [
            ScanMode::Continuous,
            ScanMode::FirstFrameIdle,
            ScanMode::EveryFrameIdle,
            ScanMode::FrameAveraging,
        ] {
            assert_eq!(ScanMode::from_wire(mode.wire()).unwrap(), mode);
        }
        assert!(ScanMode::from_wire(4).is_err());
    }

    #[test]
    fn optical_trigger_uses_high_code_page_for_one_time_modes() {
        assert_eq!(OpticalTriggerMode::OneTimeRisingEdge.wire(), 0x81);
        assert_eq!(OpticalTriggerMode::OneTimeFallingEdge.wire(), 0x82);
        assert_eq!(
            OpticalTriggerMode::from_wire(0x82).unwrap(),
            OpticalTriggerMode::OneTimeFallingEdge
        );
        assert!(OpticalTriggerMode::from_wire(3).is_err());
        assert!(OpticalTriggerMode::from_wire(0x80).is_err());
    }

    #[test]
    fn trigger_edge_covers_both_edges() {
        assert_eq!(TriggerEdge::from_wire(3).unwrap(), TriggerEdge::Both);
        assert!(TriggerEdge::from_wire(4).is_err());
    }

    #[test]
    fn status_flags() {
        let status = Status {
            flags: 0x03,
            frames_in_memory: 7,
        };
        assert!(status.in_progress());
        assert!(status.memory_full());

        let idle = Status {
            flags: 0x00,
            frames_in_memory: 0,
        };
        assert!(!idle.in_progress());
        assert!(!idle.memory_full());
    }

    #[test]
    fn averaging_status_reads_frame_count_field() {
        let status = Status {
            flags: 0,
            frames_in_memory: 1,
        };
        assert_eq!(status.averaging().unwrap(), AveragingStatus::Ready);

        let stale = Status {
            flags: 0,
            frames_in_memory: 2,
        };
        assert_eq!(
            stale.averaging().unwrap(),
            AveragingStatus::ReadyFramesLost
        );

        let counting = Status {
            flags: 0,
            frames_in_memory: 42,
        };
        assert!(counting.averaging().is_err());
    }

    #[test]
    fn exposure_reported_in_microseconds() {
        let params = AcquisitionParams {
            scans: 1,
            blank_scans: 0,
            mode: ScanMode::Continuous,
            exposure: 150,
        };
        assert_eq!(params.exposure_micros(), 1500);
    }
}
