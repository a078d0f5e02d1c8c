//! aseq CLI - Command-line tool for ASEQ USB spectrometers.
//!
//! ## Features
//!
//! - Enumerate connected spectrometers
//! - Capture spectra with configurable acquisition parameters
//! - Read, write and erase the calibration flash
//! - Shell completion generation
//! - Environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;

use aseq::ScanMode;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;

/// aseq - A cross-platform tool for ASEQ USB spectrometers.
///
/// Environment variables:
///   ASEQ_SERIAL   - Default device serial number
///   ASEQ_INDEX    - Default device index (see `aseq list`)
#[derive(Parser)]
#[command(name = "aseq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "For more information, visit: https://github.com/aseq-rs/aseq")]
struct Cli {
    /// Serial number of the spectrometer to use.
    #[arg(short, long, global = true, env = "ASEQ_SERIAL")]
    serial: Option<String>,

    /// Zero-based index into the device list (see `aseq list`).
    #[arg(short, long, global = true, env = "ASEQ_INDEX", conflicts_with = "serial")]
    index: Option<usize>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Scan mode of a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Capture frames back to back (default).
    Continuous,
    /// Idle the sensor until the first frame starts.
    FirstFrameIdle,
    /// Idle the sensor before every frame.
    EveryFrameIdle,
    /// Average all scans on the device and read one averaged spectrum.
    Averaging,
}

impl From<Mode> for ScanMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Continuous => ScanMode::Continuous,
            Mode::FirstFrameIdle => ScanMode::FirstFrameIdle,
            Mode::EveryFrameIdle => ScanMode::EveryFrameIdle,
            Mode::Averaging => ScanMode::FrameAveraging,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List connected spectrometers.
    List {
        /// Output the device list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Show status and settings of a spectrometer.
    Info {
        /// Output the report as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Capture a spectrum and print it, one value per line.
    Acquire {
        /// Exposure time in microseconds (10 us resolution).
        #[arg(short, long, default_value = "100000")]
        exposure: u64,

        /// Number of scans to capture.
        #[arg(long, default_value = "1")]
        scans: u16,

        /// Blank scans to discard before the capture.
        #[arg(long, default_value = "0")]
        blank: u16,

        /// Scan mode.
        #[arg(short, long, value_enum, default_value = "continuous")]
        mode: Mode,

        /// Stored frame to read back, zero being the oldest.
        #[arg(long, default_value = "0")]
        frame: u16,

        /// Give up if the capture is still running after this many seconds.
        #[arg(long, default_value = "30")]
        wait: u64,

        /// Strip the service elements and order values by wavelength.
        #[arg(long)]
        strip: bool,

        /// Write values to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Access the calibration flash.
    Flash {
        #[command(subcommand)]
        command: FlashCommands,
    },

    /// Clear the frame memory.
    Clear,

    /// Reboot the spectrometer.
    Reset,

    /// Detach the spectrometer from USB until replugged or reset.
    Detach,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Calibration flash operations.
#[derive(Subcommand)]
enum FlashCommands {
    /// Read flash contents to a file or stdout.
    Read {
        /// Flash offset to read from (hex).
        #[arg(value_parser = parse_hex_u32)]
        offset: u32,

        /// Number of bytes to read.
        length: usize,

        /// Write the bytes to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a file to flash.
    Write {
        /// File to write.
        file: PathBuf,

        /// Flash offset to write at (hex).
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Skip the check that the target region is erased.
        #[arg(long)]
        force: bool,
    },

    /// Erase the entire flash (requires confirmation).
    Erase {
        /// Confirm the erase.
        #[arg(long)]
        yes: bool,
    },
}

/// Parse hexadecimal offset (supports 0x prefix and underscores).
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    // Support underscore separators like 0x1_F000
    let s: String = s.chars().filter(|c| *c != '_').collect();
    u32::from_str_radix(&s, 16).map_err(|e| format!("Invalid hex offset: {e}"))
}

fn main() -> Result<()> {
    // --- NO_COLOR and TTY detection (clig.dev best practice) ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        // Disable all color output
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "aseq v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match &cli.command {
        Commands::List { json } => {
            commands::list::cmd_list(*json)?;
        },
        Commands::Info { json } => {
            commands::info::cmd_info(&cli, *json)?;
        },
        Commands::Acquire {
            exposure,
            scans,
            blank,
            mode,
            frame,
            wait,
            strip,
            output,
        } => {
            let options = commands::acquire::AcquireOptions {
                exposure: *exposure,
                scans: *scans,
                blank: *blank,
                mode: *mode,
                frame: *frame,
                wait: *wait,
                strip: *strip,
                output: output.clone(),
            };
            commands::acquire::cmd_acquire(&cli, &options)?;
        },
        Commands::Flash { command } => match command {
            FlashCommands::Read {
                offset,
                length,
                output,
            } => {
                commands::flash::cmd_flash_read(&cli, *offset, *length, output.as_deref())?;
            },
            FlashCommands::Write {
                file,
                offset,
                force,
            } => {
                commands::flash::cmd_flash_write(&cli, file, *offset, *force)?;
            },
            FlashCommands::Erase { yes } => {
                commands::flash::cmd_flash_erase(&cli, *yes)?;
            },
        },
        Commands::Clear => {
            commands::device::cmd_clear(&cli)?;
        },
        Commands::Reset => {
            commands::device::cmd_reset(&cli)?;
        },
        Commands::Detach => {
            commands::device::cmd_detach(&cli)?;
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}
