//! Bare control commands.

use anyhow::{Context, Result};
use console::style;

use crate::Cli;
use crate::commands::open_spectrometer;

/// Drop every stored frame.
pub(crate) fn cmd_clear(cli: &Cli) -> Result<()> {
    let mut dev = open_spectrometer(cli, cli.quiet)?;
    dev.clear_memory()
        .context("failed to clear the frame memory")?;
    if !cli.quiet {
        eprintln!("{} Frame memory cleared.", style("✓").green().bold());
    }
    Ok(())
}

/// Reboot the device. The USB link drops and comes back.
pub(crate) fn cmd_reset(cli: &Cli) -> Result<()> {
    let mut dev = open_spectrometer(cli, cli.quiet)?;
    dev.reset().context("failed to send the reset")?;
    if !cli.quiet {
        eprintln!(
            "{} Reset sent; the device re-enumerates shortly.",
            style("🔄").cyan()
        );
    }
    Ok(())
}

/// Detach the device from the bus.
pub(crate) fn cmd_detach(cli: &Cli) -> Result<()> {
    let mut dev = open_spectrometer(cli, cli.quiet)?;
    dev.detach().context("failed to send the detach")?;
    if !cli.quiet {
        eprintln!(
            "{} Detached. Replug the device to reconnect.",
            style("✓").green().bold()
        );
    }
    Ok(())
}
