//! RoboLT CLI — drive motors and outputs, read inputs of a Fischertechnik RoboLT.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;

/// Shared shutdown flag, cleared by the Ctrl+C handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "robolt-cli",
    version,
    about = "Command-line control for the Fischertechnik RoboLT interface"
)]
struct Args {
    /// Output as JSON (for devices, info, inputs, config)
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging (frames sent and received)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Device to use: USB serial or bus path (default: from config, else first found)
    #[arg(long, global = true, value_name = "SERIAL|PATH")]
    device: Option<String>,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();

    ctrlc::set_handler(move || {
        RUNNING.store(false, Ordering::SeqCst);
    })
    .ok();

    let opts = cli::Options {
        json: args.json,
        config_path: args.config,
        device: args.device,
    };

    if let Err(e) = cli::run(args.command, &opts) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
