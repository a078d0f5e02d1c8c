//! Calibration flash access.

use anyhow::{Context, Result, bail};
use console::style;
use log::error;
use std::fs;
use std::io::{self, Write as _};
use std::path::Path;

use crate::Cli;
use crate::commands::{open_spectrometer, progress_bar};

/// Read a flash span to a file or to stdout.
pub(crate) fn cmd_flash_read(
    cli: &Cli,
    offset: u32,
    length: usize,
    output: Option<&Path>,
) -> Result<()> {
    let mut dev = open_spectrometer(cli, cli.quiet)?;

    let mut data = vec![0u8; length];
    let pb = progress_bar(cli.quiet, length as u64, "reading flash");
    dev.read_flash_with(&mut data, offset, &mut |done, _| {
        pb.set_position(done as u64);
    })
    .context("flash read failed")?;
    pb.finish_and_clear();

    match output {
        Some(path) => {
            fs::write(path, &data)
                .with_context(|| format!("failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} Read {} bytes at {:#07x} to {}",
                    style("✓").green().bold(),
                    length,
                    offset,
                    style(path.display()).yellow()
                );
            }
        },
        None => {
            io::stdout().write_all(&data)?;
        },
    }

    Ok(())
}

/// Write a file into flash, refusing non-erased targets unless forced.
pub(crate) fn cmd_flash_write(cli: &Cli, file: &Path, offset: u32, force: bool) -> Result<()> {
    let data =
        fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let mut dev = open_spectrometer(cli, cli.quiet)?;

    // Flash cells only take writes while erased, so a dirty target would
    // corrupt the data silently.
    if !force {
        let mut current = vec![0u8; data.len()];
        dev.read_flash(&mut current, offset)
            .context("erased-state check failed")?;
        if current.iter().any(|&b| b != 0xFF) {
            bail!(
                "target region at {offset:#07x} is not erased; \
                 run `aseq flash erase --yes` first or pass --force"
            );
        }
    }

    let pb = progress_bar(cli.quiet, data.len() as u64, "writing flash");
    dev.write_flash_with(&data, offset, &mut |done, _| {
        pb.set_position(done as u64);
    })
    .context("flash write failed")?;
    pb.finish_and_clear();

    if !cli.quiet {
        eprintln!(
            "{} Wrote {} bytes at {:#07x}",
            style("✓").green().bold(),
            data.len(),
            offset
        );
    }

    Ok(())
}

/// Erase the whole flash after explicit confirmation.
pub(crate) fn cmd_flash_erase(cli: &Cli, yes: bool) -> Result<()> {
    if !yes {
        error!("flash erase requires explicit confirmation");
        if !cli.quiet {
            eprintln!(
                "{} Pass {} to erase the entire calibration flash.",
                style("⚠").yellow(),
                style("--yes").cyan()
            );
        }
        std::process::exit(2);
    }

    let mut dev = open_spectrometer(cli, cli.quiet)?;

    if !cli.quiet {
        eprintln!(
            "{} Erasing flash (this takes a few seconds)",
            style("🗑").red()
        );
    }
    dev.erase_flash().context("flash erase failed")?;

    if !cli.quiet {
        eprintln!("{} Flash erased.", style("✓").green().bold());
    }

    Ok(())
}
