//! `config` subcommand — show current configuration and file path.

use std::path::Path;

use super::{Config, ConfigOutput, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(json: bool, custom_path: Option<&Path>, config: Config) -> Result<()> {
    let config_path = custom_path.map(|p| p.to_path_buf()).or_else(Config::path);
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());

    if json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
        });
    }

    let w = kv_width(
        &["Config file:"],
        &["device:", "default_speed:", "default_pwm:", "poll_interval_ms:"],
    );

    match &config_path {
        Some(p) if config_exists => kv("Config file:", format_args!("{} (loaded)", p.display()), w),
        Some(p) => kv(
            "Config file:",
            format_args!("{} (not found, using defaults)", p.display()),
            w,
        ),
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let device = if config.device.is_empty() {
        "(first found)"
    } else {
        config.device.as_str()
    };
    kv_indent("device:", device, w);
    kv_indent("default_speed:", format_args!("{}%", config.default_speed), w);
    kv_indent("default_pwm:", format_args!("{}%", config.default_pwm), w);
    kv_indent("poll_interval_ms:", config.poll_interval_ms, w);

    if let Err(errors) = config.validate() {
        println!();
        println!("Problems:");
        for e in &errors {
            println!("  {e}");
        }
    }

    Ok(())
}
