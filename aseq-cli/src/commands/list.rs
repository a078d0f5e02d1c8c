//! Device enumeration.

use anyhow::{Context, Result};
use aseq::{HidTransport, Spectrometer};
use console::style;

/// List connected spectrometers, human-readable or as JSON.
pub(crate) fn cmd_list(json: bool) -> Result<()> {
    let devices: Vec<aseq::DeviceInfo> =
        Spectrometer::<HidTransport>::devices().context("failed to enumerate USB devices")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&devices).unwrap_or_default()
        );
        return Ok(());
    }

    eprintln!("{}", style("Connected spectrometers").bold().underlined());

    if devices.is_empty() {
        eprintln!("  {}", style("No spectrometers found.").dim());
        return Ok(());
    }

    for (index, device) in devices.iter().enumerate() {
        let serial = device.serial.as_deref().unwrap_or("<no serial>");
        let product = device.product.as_deref().unwrap_or("");

        eprintln!(
            "  [{index}] {} {}{}",
            style("•").green(),
            style(serial).cyan(),
            if product.is_empty() {
                String::new()
            } else {
                format!(" - {}", style(product).dim())
            }
        );
    }

    Ok(())
}
