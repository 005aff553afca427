//! usb-rgb CLI: set a static color on a USB RGB controller.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use usb_rgb_core::config::{ConfigStore, JsonFileStore};
use usb_rgb_core::controller::{set_color_reporting, SetOutcome, SetReport, SetRequest, Stage};
use usb_rgb_core::device::DeviceDescriptor;
use usb_rgb_core::error::Error;
use usb_rgb_core::ident::HexOrInt;
use usb_rgb_core::payload::normalize_color;
use usb_rgb_core::usb::RusbBus;

#[derive(Parser)]
#[command(
    name = "usb-rgb",
    version,
    about = "Universal USB RGB controller",
    arg_required_else_help = true
)]
struct Cli {
    /// Saved configuration file (defaults to the user config directory).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all connected USB devices.
    Scan,
    /// Set a static color and save the working configuration.
    Set {
        /// Hex color code (e.g. FF0000 or #ff0000).
        color: String,
        /// Device vendor ID in hex (e.g. 0416 or 0x0416).
        #[arg(long)]
        vid: Option<HexOrInt>,
        /// Device product ID in hex (e.g. 7399 or 0x7399).
        #[arg(long)]
        pid: Option<HexOrInt>,
    },
}

fn default_config_path() -> Result<PathBuf> {
    directories::ProjectDirs::from("", "", "usb-rgb")
        .map(|dirs| dirs.config_dir().join("config.json"))
        .ok_or_else(|| anyhow!("could not determine a configuration directory, pass --config"))
}

fn write_scan(out: &mut impl Write, devices: &[DeviceDescriptor]) -> io::Result<()> {
    writeln!(out, "{:<10} {:<10} Product Name", "VID", "PID")?;
    writeln!(out, "{}", "-".repeat(50))?;
    for dev in devices {
        writeln!(
            out,
            "{:<10} {:<10} {}",
            format!("{:#x}", dev.vid),
            format!("{:#x}", dev.pid),
            dev.product_name()
        )?;
    }

    if devices.is_empty() {
        writeln!(
            out,
            "No devices found or permission denied (try running with elevated privileges)."
        )?;
    }
    Ok(())
}

fn write_set_report(
    out: &mut impl Write,
    color: &str,
    report: &SetReport,
    location: &str,
) -> io::Result<()> {
    if let Some(warning) = report.config_warning() {
        writeln!(out, "Warning: {warning}")?;
    }

    let outcome = &report.outcome;
    match outcome {
        SetOutcome::Applied { save_error, .. } => {
            writeln!(out, "Successfully set color to #{}", normalize_color(color))?;
            match save_error {
                None => writeln!(out, "Configuration saved to {location}")?,
                Some(_) => {
                    if let Some(message) = outcome.diagnostic() {
                        writeln!(out, "Warning: {message}")?;
                    }
                }
            }
        }
        SetOutcome::Failed {
            error: Error::MissingIdentity,
            ..
        } => {
            writeln!(out, "Error: VID and PID are missing.")?;
            writeln!(out, "Usage first time: usb-rgb set <color> --vid <vid> --pid <pid>")?;
            writeln!(out, "Run 'usb-rgb scan' to find your device IDs.")?;
        }
        SetOutcome::Failed {
            stage: Stage::Send,
            error,
        } => {
            writeln!(out, "Device found, but failed to send packet: {error}")?;
        }
        SetOutcome::Failed { error, .. } => {
            writeln!(out, "Error: {error}")?;
        }
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let bus = RusbBus::new();

    match cli.command {
        Commands::Scan => match usb_rgb_core::device::enumerate(&bus) {
            Ok(devices) => {
                let devices: Vec<_> = devices.collect();
                write_scan(&mut io::stdout().lock(), &devices)?;
            }
            Err(e) => {
                println!("Error: {e}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Set { color, vid, pid } => {
            let path = match cli.config {
                Some(path) => path,
                None => default_config_path()?,
            };
            let store = JsonFileStore::new(path);
            let request = SetRequest { color, vid, pid };

            let report = set_color_reporting(&bus, &store, &request);
            write_set_report(
                &mut io::stdout().lock(),
                &request.color,
                &report,
                &store.location(),
            )?;
            if !report.outcome.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
