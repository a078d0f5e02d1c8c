//! Chunked transfers: frame pulls, flash reads, flash writes.
//!
//! Reads stream bounded bursts of packets that are reassembled by each
//! packet's embedded offset; writes move synchronously acknowledged chunks.
//! Both ride on the session plumbing from the parent module, so the
//! reconnect policy applies to every burst request and chunk write alike.

use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::protocol::burst::{self, BurstPlan};
use crate::protocol::wire::{self, Chunk, Request};
use crate::transport::Transport;

use super::Spectrometer;

impl<T: Transport> Spectrometer<T> {
    /// Number of pixels in one frame, asking the device on first use.
    ///
    /// The width is cached; format changes made through this session keep
    /// the cache current.
    pub fn frame_pixels(&mut self) -> Result<u16> {
        if self.frame_pixels == 0 {
            self.frame_format()?;
        }
        Ok(self.frame_pixels)
    }

    /// Pull one captured frame into `pixels`.
    ///
    /// `frame` selects a stored frame, zero being the oldest, or
    /// [`wire::AVERAGED_FRAME`] for the averaged spectrum. The destination
    /// must hold at least one full frame; only the frame's pixels are
    /// written. Packets are placed by their embedded offsets, so arrival
    /// order does not matter. On error the buffer contents are unspecified.
    pub fn read_frame(&mut self, pixels: &mut [u16], frame: u16) -> Result<()> {
        self.ensure_open()?;
        let width = usize::from(self.frame_pixels()?);
        if pixels.len() < width {
            return Err(Error::BufferTooSmall {
                needed: width,
                len: pixels.len(),
            });
        }
        let packets = burst::packets_for(width, wire::PIXELS_PER_PACKET);
        if packets > usize::from(wire::MAX_FRAME_PACKETS) {
            return Err(Error::FrameTooLarge {
                packets,
                max: wire::MAX_FRAME_PACKETS,
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        let budget = packets as u8;

        debug!("pulling frame {frame:#06x}: {width} pixels in {packets} packets");
        let request = Request::get_frame(0, frame, budget);
        self.try_write(&request)?;

        let window = &mut pixels[..width];
        for received in 1..=budget {
            let body = self.read_reply(request.reply_code(), wire::STANDARD_TIMEOUT)?;
            let chunk = Chunk::parse(&body).ok_or(Error::ReadFailed)?;
            burst::check_countdown(chunk.remaining, budget - received)?;

            let base = usize::from(chunk.local_offset);
            let take = wire::PIXELS_PER_PACKET.min(window.len().saturating_sub(base));
            for (slot, pixel) in window[base..base + take].iter_mut().zip(chunk.pixels()) {
                *slot = pixel;
            }
            trace!(
                "frame chunk at pixel {base}: {take} pixels, {} packets left",
                chunk.remaining
            );
        }
        Ok(())
    }

    /// Read `dst.len()` flash bytes starting at `offset`.
    pub fn read_flash(&mut self, dst: &mut [u8], offset: u32) -> Result<()> {
        self.read_flash_with(dst, offset, &mut |_, _| {})
    }

    /// [`read_flash`](Self::read_flash) with per-packet progress reporting.
    ///
    /// `progress` receives the byte counts done so far and in total.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_flash_with<F>(&mut self, dst: &mut [u8], offset: u32, progress: &mut F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        check_range(offset, dst.len())?;
        if dst.is_empty() {
            return Ok(());
        }
        self.ensure_open()?;

        let total = dst.len();
        debug!("reading {total} flash bytes at {offset:#07x}");
        let mut done = 0usize;
        for burst in BurstPlan::new(total, wire::MAX_FLASH_READ_PACKETS, wire::FLASH_BYTES_PER_PACKET)
        {
            let request = Request::read_flash(offset + burst.base as u32, burst.packets);
            self.try_write(&request)?;

            let window = &mut dst[burst.base..];
            for received in 1..=burst.packets {
                let body = self.read_reply(request.reply_code(), wire::STANDARD_TIMEOUT)?;
                let chunk = Chunk::parse(&body).ok_or(Error::ReadFailed)?;
                burst::check_countdown(chunk.remaining, burst.packets - received)?;

                let at = usize::from(chunk.local_offset);
                let take = chunk.payload.len().min(window.len().saturating_sub(at));
                window[at..at + take].copy_from_slice(&chunk.payload[..take]);
                done += take;
                trace!(
                    "flash chunk at byte {}: {take} bytes, {} packets left",
                    burst.base + at,
                    chunk.remaining
                );
                progress(done.min(total), total);
            }
        }
        Ok(())
    }

    /// Write `src` to flash starting at `offset`.
    ///
    /// The data moves in chunks of up to
    /// [`wire::MAX_FLASH_WRITE_PAYLOAD`] bytes, each acknowledged before the
    /// next is sent. A device error stops the write with the earlier chunks
    /// already committed.
    pub fn write_flash(&mut self, src: &[u8], offset: u32) -> Result<()> {
        self.write_flash_with(src, offset, &mut |_, _| {})
    }

    /// [`write_flash`](Self::write_flash) with per-chunk progress reporting.
    ///
    /// `progress` receives the byte counts committed so far and in total.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_flash_with<F>(&mut self, src: &[u8], offset: u32, progress: &mut F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        check_range(offset, src.len())?;
        if src.is_empty() {
            return Ok(());
        }

        debug!("writing {} flash bytes at {offset:#07x}", src.len());
        let mut at = offset;
        let mut done = 0usize;
        for chunk in src.chunks(wire::MAX_FLASH_WRITE_PAYLOAD) {
            let body = self.exchange(&Request::write_flash(at, chunk), wire::STANDARD_TIMEOUT)?;
            if body[1] != 0 {
                return Err(Error::Device(body[1]));
            }
            trace!("flash chunk at {at:#07x} acknowledged: {} bytes", chunk.len());
            at += chunk.len() as u32;
            done += chunk.len();
            progress(done, src.len());
        }
        Ok(())
    }

    /// Erase the whole flash array.
    ///
    /// The chip takes a while; the acknowledgement gets its own long
    /// timeout.
    pub fn erase_flash(&mut self) -> Result<()> {
        info!("erasing flash");
        self.command(&Request::erase_flash(), wire::ERASE_TIMEOUT)?;
        Ok(())
    }
}

/// Flash accesses must stay inside the array.
fn check_range(offset: u32, len: usize) -> Result<()> {
    if offset >= wire::FLASH_SIZE || u64::from(offset) + len as u64 > u64::from(wire::FLASH_SIZE) {
        return Err(Error::FlashRange {
            offset,
            len,
            size: wire::FLASH_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{
        MockTransport, WriteOutcome, ack_body, chunk_body, pixel_chunk_body,
    };

    const FRAME_REPLY: u8 = 0x8A;
    const FLASH_REPLY: u8 = 0x9A;

    fn session(transport: MockTransport) -> Spectrometer<MockTransport> {
        Spectrometer::with_transport(transport, Some("NS1234567".to_owned()))
    }

    fn session_with_width(transport: MockTransport, width: u16) -> Spectrometer<MockTransport> {
        let mut dev = session(transport);
        dev.frame_pixels = width;
        dev
    }

    /// Thirty pixels whose values equal their position within the frame.
    fn identity_pixels(base: u16) -> Vec<u16> {
        (base..base + 30).collect()
    }

    #[test]
    fn full_frame_arrives_in_one_burst_placed_by_offset() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut transport = MockTransport::new();
        // 3648 pixels need 122 packets. The first two arrive out of order;
        // the countdown still follows arrival order.
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 30, 121, &identity_pixels(30)));
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 0, 120, &identity_pixels(0)));
        for packet in 2..122u16 {
            let offset = packet * 30;
            #[allow(clippy::cast_possible_truncation)]
            let remaining = (121 - packet) as u8;
            transport.push_reply(pixel_chunk_body(
                FRAME_REPLY,
                offset,
                remaining,
                &identity_pixels(offset),
            ));
        }

        let mut dev = session_with_width(transport, 3648);
        let mut pixels = vec![0u16; 3648];
        dev.read_frame(&mut pixels, 0).unwrap();

        for (at, value) in pixels.iter().enumerate() {
            assert_eq!(usize::from(*value), at, "pixel {at}");
        }

        let sent = &dev.transport.written;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][1], 0x0A);
        assert_eq!(&sent[0][2..4], &[0, 0]);
        assert_eq!(&sent[0][4..6], &0u16.to_le_bytes());
        assert_eq!(sent[0][6], 122);
    }

    #[test]
    fn unknown_width_is_queried_before_the_pull() {
        let mut transport = MockTransport::new();
        let mut format = [0u8; wire::REPORT_LEN];
        format[0] = 0x88;
        format[3..5].copy_from_slice(&59u16.to_le_bytes());
        format[6..8].copy_from_slice(&60u16.to_le_bytes());
        transport.push_reply(format);
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 0, 1, &identity_pixels(0)));
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 30, 0, &identity_pixels(30)));

        let mut dev = session(transport);
        let mut pixels = vec![0u16; 64];
        dev.read_frame(&mut pixels, 3).unwrap();

        let opcodes: Vec<u8> = dev.transport.written.iter().map(|r| r[1]).collect();
        assert_eq!(opcodes, vec![0x08, 0x0A]);
        // The frame request names the stored frame index.
        assert_eq!(&dev.transport.written[1][4..6], &3u16.to_le_bytes());
        assert_eq!(pixels[59], 59);
        // Elements past the frame width stay untouched.
        assert_eq!(pixels[60], 0);
    }

    #[test]
    fn averaged_frame_uses_the_sentinel_index() {
        let mut transport = MockTransport::new();
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 0, 0, &identity_pixels(0)));

        let mut dev = session_with_width(transport, 30);
        let mut pixels = vec![0u16; 30];
        dev.read_frame(&mut pixels, wire::AVERAGED_FRAME).unwrap();

        assert_eq!(&dev.transport.written[0][4..6], &[0xFF, 0xFF]);
    }

    #[test]
    fn oversized_frame_fails_before_any_request() {
        let transport = MockTransport::new();
        let mut dev = session_with_width(transport, 3750);

        let mut pixels = vec![0u16; 3750];
        let err = dev.read_frame(&mut pixels, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameTooLarge {
                packets: 125,
                max: 124
            }
        ));
        assert!(dev.transport.written.is_empty());
    }

    #[test]
    fn short_destination_is_rejected() {
        let transport = MockTransport::new();
        let mut dev = session_with_width(transport, 3648);

        let mut pixels = vec![0u16; 100];
        let err = dev.read_frame(&mut pixels, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::BufferTooSmall {
                needed: 3648,
                len: 100
            }
        ));
        assert!(dev.transport.written.is_empty());
    }

    #[test]
    fn countdown_sentinel_aborts_the_pull() {
        let mut transport = MockTransport::new();
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 0, 2, &identity_pixels(0)));
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 30, 250, &identity_pixels(30)));

        let mut dev = session_with_width(transport, 90);
        let mut pixels = vec![0u16; 90];
        let err = dev.read_frame(&mut pixels, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::RemainingPackets {
                expected: 1,
                reported: 250
            }
        ));
    }

    #[test]
    fn countdown_disagreement_aborts_the_pull() {
        let mut transport = MockTransport::new();
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 0, 2, &identity_pixels(0)));
        transport.push_reply(pixel_chunk_body(FRAME_REPLY, 30, 0, &identity_pixels(30)));

        let mut dev = session_with_width(transport, 90);
        let mut pixels = vec![0u16; 90];
        let err = dev.read_frame(&mut pixels, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::RemainingPackets {
                expected: 1,
                reported: 0
            }
        ));
    }

    #[test]
    fn wrong_reply_code_aborts_the_pull() {
        let mut transport = MockTransport::new();
        transport.push_reply(chunk_body(FLASH_REPLY, 0, 0, &[0u8; 60]));

        let mut dev = session_with_width(transport, 30);
        let mut pixels = vec![0u16; 30];
        let err = dev.read_frame(&mut pixels, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedReply {
                expected: 0x8A,
                actual: 0x9A
            }
        ));
    }

    #[test]
    fn flash_read_spans_multiple_bursts() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut transport = MockTransport::new();
        // 9000 bytes split into bursts of 100 and 50 packets. Payload bytes
        // equal their absolute position modulo 256.
        for burst_base in [0usize, 6000] {
            let packets = if burst_base == 0 { 100u16 } else { 50 };
            for packet in 0..packets {
                let at = usize::from(packet) * 60;
                #[allow(clippy::cast_possible_truncation)]
                let payload: Vec<u8> = (0..60).map(|j| (burst_base + at + j) as u8).collect();
                #[allow(clippy::cast_possible_truncation)]
                let remaining = (packets - 1 - packet) as u8;
                transport.push_reply(chunk_body(FLASH_REPLY, at as u16, remaining, &payload));
            }
        }

        let mut dev = session(transport);
        let mut data = vec![0u8; 9000];
        dev.read_flash(&mut data, 0x100).unwrap();

        for (at, value) in data.iter().enumerate() {
            assert_eq!(*value, at as u8, "byte {at}");
        }

        let sent = &dev.transport.written;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0][1], 0x1A);
        assert_eq!(&sent[0][2..6], &0x100u32.to_le_bytes());
        assert_eq!(sent[0][6], 100);
        assert_eq!(&sent[1][2..6], &(0x100u32 + 6000).to_le_bytes());
        assert_eq!(sent[1][6], 50);
    }

    #[test]
    fn flash_read_clamps_the_final_partial_packet() {
        let mut transport = MockTransport::new();
        transport.push_reply(chunk_body(FLASH_REPLY, 0, 1, &[0x11; 60]));
        transport.push_reply(chunk_body(FLASH_REPLY, 60, 0, &[0x22; 60]));

        let mut dev = session(transport);
        let mut data = vec![0u8; 70];
        let mut seen = Vec::new();
        dev.read_flash_with(&mut data, 0, &mut |done, total| seen.push((done, total)))
            .unwrap();

        assert!(data[..60].iter().all(|&b| b == 0x11));
        assert!(data[60..].iter().all(|&b| b == 0x22));
        assert_eq!(seen, vec![(60, 70), (70, 70)]);
    }

    #[test]
    fn zero_length_flash_read_exchanges_nothing() {
        let transport = MockTransport::new();
        let mut dev = session(transport);
        let mut empty: [u8; 0] = [];
        dev.read_flash(&mut empty, 0x1FFFF).unwrap();
        assert!(dev.transport.written.is_empty());
    }

    #[test]
    fn flash_read_rejects_out_of_range_spans() {
        let transport = MockTransport::new();
        let mut dev = session(transport);

        let mut data = [0u8; 4];
        let err = dev.read_flash(&mut data, 0x20000).unwrap_err();
        assert!(matches!(err, Error::FlashRange { offset: 0x20000, .. }));

        let err = dev.read_flash(&mut data, 0x1FFFE).unwrap_err();
        assert!(matches!(
            err,
            Error::FlashRange {
                offset: 0x1FFFE,
                len: 4,
                ..
            }
        ));
        assert!(dev.transport.written.is_empty());
    }

    #[test]
    fn range_check_covers_the_whole_array() {
        assert!(check_range(0, 0x20000).is_ok());
        assert!(check_range(0x1FFFF, 1).is_ok());
        assert!(check_range(0, 0x20001).is_err());
        assert!(check_range(0x20000, 0).is_err());
    }

    #[test]
    fn flash_write_moves_synchronous_58_byte_chunks() {
        let mut transport = MockTransport::new();
        for _ in 0..3 {
            transport.push_reply(ack_body(0x9B, 0));
        }

        let data: Vec<u8> = (0..120u32).map(|b| b as u8).collect();
        let mut dev = session(transport);
        let mut seen = Vec::new();
        dev.write_flash_with(&data, 0x1000, &mut |done, total| seen.push((done, total)))
            .unwrap();

        let sent = &dev.transport.written;
        assert_eq!(sent.len(), 3);
        for report in sent {
            assert_eq!(report[1], 0x1B);
        }
        assert_eq!(&sent[0][2..6], &0x1000u32.to_le_bytes());
        assert_eq!(sent[0][6], 58);
        assert_eq!(&sent[0][7..65], &data[..58]);
        assert_eq!(&sent[1][2..6], &0x103Au32.to_le_bytes());
        assert_eq!(sent[1][6], 58);
        assert_eq!(&sent[1][7..65], &data[58..116]);
        assert_eq!(&sent[2][2..6], &0x1074u32.to_le_bytes());
        assert_eq!(sent[2][6], 4);
        assert_eq!(&sent[2][7..11], &data[116..]);

        assert_eq!(seen, vec![(58, 120), (116, 120), (120, 120)]);
    }

    #[test]
    fn flash_write_stops_at_the_first_rejected_chunk() {
        let mut transport = MockTransport::new();
        transport.push_reply(ack_body(0x9B, 0));
        transport.push_reply(ack_body(0x9B, 5));

        let data = [0xA5u8; 120];
        let mut dev = session(transport);
        let err = dev.write_flash(&data, 0x1000).unwrap_err();

        assert!(matches!(err, Error::Device(5)));
        // The first chunk was committed, the second rejected, the third
        // never sent.
        assert_eq!(dev.transport.written.len(), 2);
    }

    #[test]
    fn flash_write_rejects_out_of_range_spans() {
        let transport = MockTransport::new();
        let mut dev = session(transport);

        let data = [0u8; 0x20];
        let err = dev.write_flash(&data, 0x1FFF0).unwrap_err();
        assert!(matches!(
            err,
            Error::FlashRange {
                offset: 0x1FFF0,
                len: 0x20,
                ..
            }
        ));
        assert!(dev.transport.written.is_empty());
    }

    #[test]
    fn zero_length_flash_write_exchanges_nothing() {
        let transport = MockTransport::new();
        let mut dev = session(transport);
        dev.write_flash(&[], 0).unwrap();
        assert!(dev.transport.written.is_empty());
    }

    #[test]
    fn chunk_write_failure_reconnects_once_and_retries() {
        let mut transport = MockTransport::new();
        transport.write_script.push_back(WriteOutcome::Short(3));
        transport.push_reply(ack_body(0x9B, 0));

        let mut dev = session(transport);
        dev.write_flash(&[1, 2, 3], 0).unwrap();

        assert_eq!(dev.transport.written.len(), 2);
        assert_eq!(dev.transport.reopens, vec![Some("NS1234567".to_owned())]);
    }

    #[test]
    fn erase_waits_with_the_long_timeout() {
        let mut transport = MockTransport::new();
        transport.push_reply(ack_body(0x9C, 0));

        let mut dev = session(transport);
        dev.erase_flash().unwrap();

        assert_eq!(dev.transport.written[0][1], 0x1C);
        assert_eq!(dev.transport.read_timeouts, vec![wire::ERASE_TIMEOUT]);
    }

    #[test]
    fn erase_surfaces_the_device_error_code() {
        let mut transport = MockTransport::new();
        transport.push_reply(ack_body(0x9C, 1));

        let mut dev = session(transport);
        assert!(matches!(dev.erase_flash().unwrap_err(), Error::Device(1)));
    }
}
