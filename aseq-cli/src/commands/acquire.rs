//! Spectrum capture.

use anyhow::{Context, Result, bail, ensure};
use aseq::{
    AVERAGED_FRAME, AcquisitionParams, AveragingStatus, HidTransport, LEADING_SERVICE_ELEMENTS,
    Spectrometer, TRAILING_SERVICE_ELEMENTS,
};
use console::style;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use crate::commands::open_spectrometer;
use crate::{Cli, Mode};

/// Options of the `acquire` subcommand.
pub(crate) struct AcquireOptions {
    pub exposure: u64,
    pub scans: u16,
    pub blank: u16,
    pub mode: Mode,
    pub frame: u16,
    pub wait: u64,
    pub strip: bool,
    pub output: Option<PathBuf>,
}

/// Configure the device, trigger a capture, and print the spectrum.
pub(crate) fn cmd_acquire(cli: &Cli, options: &AcquireOptions) -> Result<()> {
    ensure!(
        options.exposure >= 10,
        "exposure must be at least 10 microseconds"
    );
    let ticks = u32::try_from(options.exposure / 10).map_err(|_| {
        anyhow::anyhow!(
            "exposure of {} us is longer than the device supports",
            options.exposure
        )
    })?;

    let mut dev = open_spectrometer(cli, cli.quiet)?;

    let params = AcquisitionParams {
        scans: options.scans,
        blank_scans: options.blank,
        mode: options.mode.into(),
        exposure: ticks,
    };
    dev.set_acquisition(&params)
        .context("failed to configure the acquisition")?;

    if !cli.quiet {
        eprintln!(
            "{} Capturing {} scan(s) at {} us exposure",
            style("⏳").yellow(),
            options.scans,
            u64::from(ticks) * 10
        );
    }
    dev.trigger().context("failed to trigger the capture")?;
    wait_until_ready(&mut dev, options.mode == Mode::Averaging, options.wait)?;

    let width = usize::from(
        dev.frame_pixels()
            .context("failed to query the frame width")?,
    );
    let mut pixels = vec![0u16; width];
    let frame = if options.mode == Mode::Averaging {
        AVERAGED_FRAME
    } else {
        options.frame
    };
    dev.read_frame(&mut pixels, frame)
        .context("failed to read the frame")?;

    let written = match options.output.as_deref() {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            let written = write_values(&mut out, &pixels, options.strip)?;
            out.flush()?;
            if !cli.quiet {
                eprintln!(
                    "{} Wrote {} values to {}",
                    style("✓").green().bold(),
                    written,
                    style(path.display()).yellow()
                );
            }
            written
        },
        None => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            let written = write_values(&mut out, &pixels, options.strip)?;
            out.flush()?;
            written
        },
    };
    debug!("emitted {written} of {width} pixels");

    Ok(())
}

/// Poll the status until the capture is done or the deadline passes.
fn wait_until_ready(
    dev: &mut Spectrometer<HidTransport>,
    averaging: bool,
    wait_secs: u64,
) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(wait_secs);
    loop {
        let status = dev.status().context("failed to poll the device status")?;
        if averaging {
            match status
                .averaging()
                .context("failed to read the averaging state")?
            {
                AveragingStatus::NotReady => {},
                AveragingStatus::Ready => return Ok(()),
                AveragingStatus::ReadyFramesLost => {
                    warn!("the device dropped frames while averaging");
                    return Ok(());
                },
            }
        } else if !status.in_progress() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            bail!("capture still running after {wait_secs} s; raise --wait or check the trigger");
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Write one value per line; optionally drop the service elements and flip
/// to wavelength order.
fn write_values(out: &mut dyn Write, pixels: &[u16], strip: bool) -> Result<usize> {
    let margin = LEADING_SERVICE_ELEMENTS + TRAILING_SERVICE_ELEMENTS;
    if strip && pixels.len() > margin {
        let stripped = &pixels[LEADING_SERVICE_ELEMENTS..pixels.len() - TRAILING_SERVICE_ELEMENTS];
        for value in stripped.iter().rev() {
            writeln!(out, "{value}")?;
        }
        Ok(stripped.len())
    } else {
        if strip {
            warn!(
                "frame of {} pixels has no service margin to strip",
                pixels.len()
            );
        }
        for value in pixels {
            writeln!(out, "{value}")?;
        }
        Ok(pixels.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_drops_the_margins_and_reverses() {
        let pixels: Vec<u16> = (0..100).collect();
        let mut out = Vec::new();
        let written = write_values(&mut out, &pixels, true).unwrap();

        assert_eq!(written, 100 - 32 - 14);
        let lines: Vec<u16> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect();
        assert_eq!(lines.len(), 54);
        // Highest sensor element first once flipped.
        assert_eq!(lines[0], 85);
        assert_eq!(lines[53], 32);
    }

    #[test]
    fn unstripped_output_keeps_every_pixel_in_order() {
        let pixels: Vec<u16> = vec![7, 8, 9];
        let mut out = Vec::new();
        let written = write_values(&mut out, &pixels, false).unwrap();

        assert_eq!(written, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "7\n8\n9\n");
    }

    #[test]
    fn tiny_frames_are_not_stripped() {
        let pixels: Vec<u16> = (0..40).collect();
        let mut out = Vec::new();
        let written = write_values(&mut out, &pixels, true).unwrap();
        assert_eq!(written, 40);
    }
}
