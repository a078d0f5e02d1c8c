//! Burst bookkeeping for streamed reads.
//!
//! A streamed read asks the instrument for a burst of up to `cap` packets,
//! then drains exactly that many replies. Larger transfers repeat with the
//! base offset advanced by one full burst. The device counts the packets of
//! a burst down in each reply; [`check_countdown`] holds it to that.

use crate::error::{Error, Result};
use crate::protocol::wire::COUNTDOWN_ERROR_FLOOR;

/// Packets needed to carry `units` payload units, `per_packet` to a packet.
pub fn packets_for(units: usize, per_packet: usize) -> usize {
    units.div_ceil(per_packet)
}

/// One burst of a streamed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    /// Offset of the burst window, in payload units from the transfer start.
    pub base: usize,
    /// Packets this burst requests.
    pub packets: u8,
}

/// Splits one streamed read into bursts of at most `cap` packets.
#[derive(Debug)]
pub struct BurstPlan {
    remaining: usize,
    cap: usize,
    stride: usize,
    base: usize,
}

impl BurstPlan {
    /// Plan a read of `units` payload units with `per_packet` units to a
    /// packet and at most `cap` packets per burst.
    pub fn new(units: usize, cap: u8, per_packet: usize) -> Self {
        Self {
            remaining: packets_for(units, per_packet),
            cap: usize::from(cap),
            stride: usize::from(cap) * per_packet,
            base: 0,
        }
    }
}

impl Iterator for BurstPlan {
    type Item = Burst;

    #[allow(clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Burst> {
        if self.remaining == 0 {
            return None;
        }
        let packets = self.remaining.min(self.cap);
        let burst = Burst {
            base: self.base,
            // packets <= cap, which came in as u8
            packets: packets as u8,
        };
        self.remaining -= packets;
        self.base += self.stride;
        Some(burst)
    }
}

/// Validate the countdown field of the packet just received.
///
/// `expected` is the burst's packet budget minus the packets received so
/// far, the current one included. Values at or above the error sentinel and
/// values disagreeing with the local count both fail, with the same error.
pub fn check_countdown(reported: u8, expected: u8) -> Result<()> {
    if reported >= COUNTDOWN_ERROR_FLOOR || reported != expected {
        return Err(Error::RemainingPackets { expected, reported });
    }
    Ok(())
}
