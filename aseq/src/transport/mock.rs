//! Scripted transport for driving the session against canned replies.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::wire::{OUT_REPORT_LEN, REPORT_LEN};
use crate::transport::Transport;

/// Outcome scripted for one write call.
pub(crate) enum WriteOutcome {
    /// The link accepts the full report.
    Accept,
    /// The link accepts only part of the report.
    Short(usize),
    /// The link fails outright.
    Fail,
}

/// Transport double with independently scripted read and write sides.
///
/// Reads pop canned reply bodies; an empty queue reads as a timeout. Writes
/// are recorded as sent and consume one scripted outcome each, accepting in
/// full once the script runs out.
pub(crate) struct MockTransport {
    pub reads: VecDeque<[u8; REPORT_LEN]>,
    pub written: Vec<[u8; OUT_REPORT_LEN]>,
    pub write_script: VecDeque<WriteOutcome>,
    pub read_timeouts: Vec<Duration>,
    pub open: bool,
    pub reopens: Vec<Option<String>>,
    pub reopen_ok: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            written: Vec::new(),
            write_script: VecDeque::new(),
            read_timeouts: Vec::new(),
            open: true,
            reopens: Vec::new(),
            reopen_ok: true,
        }
    }

    pub(crate) fn push_reply(&mut self, body: [u8; REPORT_LEN]) {
        self.reads.push_back(body);
    }
}

impl Transport for MockTransport {
    fn write_report(&mut self, report: &[u8; OUT_REPORT_LEN]) -> Result<usize> {
        self.written.push(*report);
        match self.write_script.pop_front() {
            None | Some(WriteOutcome::Accept) => Ok(OUT_REPORT_LEN),
            Some(WriteOutcome::Short(count)) => Ok(count),
            Some(WriteOutcome::Fail) => Err(Error::WriteFailed),
        }
    }

    fn read_report(&mut self, body: &mut [u8; REPORT_LEN], timeout: Duration) -> Result<usize> {
        self.read_timeouts.push(timeout);
        match self.reads.pop_front() {
            Some(reply) => {
                body.copy_from_slice(&reply);
                Ok(REPORT_LEN)
            }
            // An exhausted script reads as a timeout.
            None => Ok(0),
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn reopen(&mut self, serial: Option<&str>) -> Result<()> {
        self.reopens.push(serial.map(str::to_owned));
        if self.reopen_ok {
            self.open = true;
            Ok(())
        } else {
            Err(Error::DeviceNotFound)
        }
    }
}

/// Reply body with a leading code byte and a device error code.
pub(crate) fn ack_body(reply: u8, error: u8) -> [u8; REPORT_LEN] {
    let mut body = [0u8; REPORT_LEN];
    body[0] = reply;
    body[1] = error;
    body
}

/// Streamed chunk body carrying raw payload bytes.
pub(crate) fn chunk_body(
    reply: u8,
    local_offset: u16,
    remaining: u8,
    payload: &[u8],
) -> [u8; REPORT_LEN] {
    let mut body = [0u8; REPORT_LEN];
    body[0] = reply;
    body[1..3].copy_from_slice(&local_offset.to_le_bytes());
    body[3] = remaining;
    body[4..4 + payload.len()].copy_from_slice(payload);
    body
}

/// Streamed chunk body carrying little-endian pixels.
pub(crate) fn pixel_chunk_body(
    reply: u8,
    local_offset: u16,
    remaining: u8,
    pixels: &[u16],
) -> [u8; REPORT_LEN] {
    let mut payload = Vec::with_capacity(pixels.len() * 2);
    for pixel in pixels {
        payload.extend_from_slice(&pixel.to_le_bytes());
    }
    chunk_body(reply, local_offset, remaining, &payload)
}
