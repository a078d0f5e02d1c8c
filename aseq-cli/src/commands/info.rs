//! Device status report.

use anyhow::{Context, Result};
use console::style;

use crate::Cli;
use crate::commands::open_spectrometer;

/// Query a device and print its status, settings, and frame format.
pub(crate) fn cmd_info(cli: &Cli, json: bool) -> Result<()> {
    let mut dev = open_spectrometer(cli, cli.quiet || json)?;

    let status = dev.status().context("failed to query the device status")?;
    let acquisition = dev
        .acquisition()
        .context("failed to query the acquisition parameters")?;
    let format = dev
        .frame_format()
        .context("failed to query the frame format")?;

    if json {
        let report = serde_json::json!({
            "serial": dev.serial(),
            "status": {
                "in_progress": status.in_progress(),
                "memory_full": status.memory_full(),
                "frames_in_memory": status.frames_in_memory,
            },
            "acquisition": acquisition,
            "exposure_us": acquisition.exposure_micros(),
            "frame_format": format,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
        return Ok(());
    }

    eprintln!("\n{}", style("Status").bold().underlined());
    let state = if status.in_progress() {
        style("capturing").yellow().to_string()
    } else {
        style("idle").green().to_string()
    };
    eprintln!("  State:            {state}");
    eprintln!("  Frames in memory: {}", status.frames_in_memory);
    if status.memory_full() {
        eprintln!("  {}", style("Frame memory is full.").yellow());
    }

    eprintln!("\n{}", style("Acquisition").bold().underlined());
    eprintln!("  Scans:       {}", acquisition.scans);
    eprintln!("  Blank scans: {}", acquisition.blank_scans);
    eprintln!("  Mode:        {:?}", acquisition.mode);
    eprintln!("  Exposure:    {} us", acquisition.exposure_micros());

    eprintln!("\n{}", style("Frame format").bold().underlined());
    eprintln!(
        "  Elements:         {}..={}",
        format.start_element, format.end_element
    );
    eprintln!("  Reduction:        {:?}", format.reduction);
    eprintln!("  Pixels per frame: {}", format.pixels_per_frame);

    Ok(())
}
