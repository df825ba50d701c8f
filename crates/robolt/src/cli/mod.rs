//! CLI subcommands — discovery, device info, outputs, inputs, config.

mod config_cmd;
mod devices;
mod info;
mod inputs;
mod outputs;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use robolt_lib::config::Config;
pub(super) use robolt_lib::device::{self, DiscoveredDevice, RoboDevice, UsbDevice};
pub(super) use robolt_lib::error::Result;
pub(super) use robolt_lib::frame::{Direction, InputStatus, OutputState};
pub(super) use robolt_lib::{RoboLt, RoboltError};

const PADDING: usize = 2;

/// Global flags shared by every subcommand.
pub struct Options {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub device: Option<String>,
}

/// Compute alignment width for key-value output: at least PADDING spaces
/// after the longest key, with indented keys aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn format_kv(key: &str, value: impl std::fmt::Display, w: usize) -> String {
    format!("{key:<width$}{value}", width = w)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{}", format_kv(key, value, w));
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {}", format_kv(key, value, w - 2));
}

/// Serialize for output, pretty-printed or as a single line.
pub(super) fn to_json(value: &impl Serialize, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.map_err(|e| RoboltError::Io(e.into()))
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", to_json(value, true)?);
    Ok(())
}

/// Load the config from `path` (or the default location), logging parse
/// and validation problems.
pub(super) fn load_config(path: Option<&Path>) -> Config {
    let config = match path {
        Some(p) => {
            let (config, warnings) = Config::load_from(p);
            for w in &warnings {
                log::warn!("{w}");
            }
            config
        }
        None => Config::load(),
    };
    if let Err(errors) = config.validate() {
        for e in &errors {
            log::warn!("config: {e}");
        }
    }
    config
}

/// Open the device named by `--device`, else the configured one, else the first found.
pub(super) fn open_session(opts: &Options, config: &Config) -> Result<RoboLt<UsbDevice>> {
    let selector = opts.device.as_deref().unwrap_or(&config.device);
    RoboLt::open_by(selector)
}

/// Parse an output state argument.
fn parse_state(s: &str) -> std::result::Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on or off, got '{other}'")),
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub devices: Vec<DiscoveredDevice>,
}

#[derive(Serialize)]
pub(super) struct InfoOutput {
    pub path: String,
    pub usb_serial: Option<String>,
    pub product: Option<String>,
    pub firmware: Option<String>,
    pub serial: Option<u32>,
}

#[derive(Serialize)]
pub(super) struct OutputsOutput {
    pub path: String,
    pub outputs: OutputState,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
}

#[derive(Subcommand)]
pub enum Command {
    /// List connected RoboLT devices
    Devices,

    /// Show firmware version and serial number
    Info,

    /// Set motor M1 or M2 direction and speed (other channels start off)
    Motor {
        /// Motor number (1-2)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=2))]
        id: u8,
        /// off, left, right or brake
        direction: Direction,
        /// Speed in percent (0-100, default: from config)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        speed: Option<u8>,
    },

    /// Set output O1-O4 on or off (other channels start off)
    Output {
        /// Output number (1-4)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=4))]
        id: u8,
        /// on or off
        #[arg(action = clap::ArgAction::Set, value_parser = parse_state)]
        state: bool,
        /// PWM in percent (0-100, default: from config when on, 0 when off)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        pwm: Option<u8>,
    },

    /// Switch all motors and outputs off
    Off,

    /// Read digital inputs, analog inputs and supply voltage
    Inputs {
        /// Keep reading until Ctrl+C
        #[arg(long)]
        watch: bool,
    },

    /// Show current configuration and file path
    Config,
}

pub fn run(cmd: Command, opts: &Options) -> Result<()> {
    let config = load_config(opts.config_path.as_deref());
    match cmd {
        Command::Devices => devices::cmd_devices(opts.json),
        Command::Info => info::cmd_info(opts, &config),
        Command::Motor {
            id,
            direction,
            speed,
        } => {
            let speed = speed.unwrap_or(config.default_speed);
            outputs::cmd_motor(opts, &config, id, direction, speed)
        }
        Command::Output { id, state, pwm } => {
            let pwm = pwm.unwrap_or(if state { config.default_pwm } else { 0 });
            outputs::cmd_output(opts, &config, id, state, pwm)
        }
        Command::Off => outputs::cmd_off(opts, &config),
        Command::Inputs { watch } => inputs::cmd_inputs(opts, &config, watch),
        Command::Config => {
            config_cmd::cmd_config(opts.json, opts.config_path.as_deref(), config)
        }
    }
}
