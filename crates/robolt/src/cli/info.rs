//! `info` subcommand — USB descriptors plus firmware version and serial number.

use super::{
    Config, InfoOutput, Options, Result, RoboDevice, kv, kv_width, open_session, print_json,
};

pub(super) fn cmd_info(opts: &Options, config: &Config) -> Result<()> {
    let lt = open_session(opts, config)?;
    let usb = lt.device().info().clone();

    // Info requests are best-effort: a device that answers one but not the
    // other still gets reported.
    let firmware = lt.firmware_version().ok();
    let serial = lt.serial().ok();

    if opts.json {
        return print_json(&InfoOutput {
            path: usb.path,
            usb_serial: usb.serial,
            product: usb.product,
            firmware: firmware.map(|v| v.to_string()),
            serial,
        });
    }

    let w = kv_width(&["Device:", "Product:", "USB serial:", "Firmware:", "Serial:"], &[]);
    let unknown = || "(unknown)".to_string();
    kv("Device:", &usb.path, w);
    kv("Product:", usb.product.unwrap_or_else(unknown), w);
    kv("USB serial:", usb.serial.unwrap_or_else(unknown), w);
    kv(
        "Firmware:",
        firmware.map(|v| v.to_string()).unwrap_or_else(unknown),
        w,
    );
    kv(
        "Serial:",
        serial.map(|s| s.to_string()).unwrap_or_else(unknown),
        w,
    );

    Ok(())
}
