//! `devices` subcommand — list connected RoboLT interfaces.

use super::{DevicesOutput, Result, device, print_json};

pub(super) fn cmd_devices(json: bool) -> Result<()> {
    let devices = device::enumerate_devices();

    if json {
        return print_json(&DevicesOutput {
            count: devices.len(),
            devices,
        });
    }

    if devices.is_empty() {
        println!("No RoboLT devices found.");
        return Ok(());
    }

    println!(
        "Found {} RoboLT device{}:",
        devices.len(),
        if devices.len() == 1 { "" } else { "s" }
    );
    println!();

    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}", i + 1, dev.path);
        if let Some(ref serial) = dev.serial {
            println!("      Serial: {serial}");
        }
    }

    Ok(())
}
