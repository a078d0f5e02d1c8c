//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod acquire;
pub(crate) mod completions;
pub(crate) mod device;
pub(crate) mod flash;
pub(crate) mod info;
pub(crate) mod list;

use anyhow::{Context, Result};
use aseq::{HidTransport, Spectrometer};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::Cli;

/// Open the spectrometer selected by the global `--serial`/`--index` flags.
pub(crate) fn open_spectrometer(cli: &Cli, quiet: bool) -> Result<Spectrometer<HidTransport>> {
    let dev = match (cli.serial.as_deref(), cli.index) {
        (Some(serial), _) => Spectrometer::open_by_serial(serial),
        (None, Some(index)) => Spectrometer::open_at(index),
        (None, None) => Spectrometer::open_first(),
    }
    .context("failed to open a spectrometer")?;

    if !quiet {
        eprintln!(
            "{} Using spectrometer {}",
            style("🔌").cyan(),
            style(dev.serial().unwrap_or("<no serial>")).cyan()
        );
    }
    Ok(dev)
}

/// Progress bar for flash transfers, hidden in quiet or non-TTY runs.
pub(crate) fn progress_bar(quiet: bool, len: u64, msg: &str) -> ProgressBar {
    if quiet || !crate::use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(len);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(msg.to_string());
        pb
    }
}
