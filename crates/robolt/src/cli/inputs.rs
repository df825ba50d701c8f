//! `inputs` subcommand — one status read, or a polling loop with `--watch`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use super::{
    Config, InputStatus, Options, RUNNING, Result, RoboDevice, RoboLt, RoboltError, kv, kv_width,
    open_session, print_json, to_json,
};
use robolt_lib::device::DeviceError;

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

/// One-line summary used by `--watch`.
pub(super) fn format_status_line(s: &InputStatus) -> String {
    format!(
        "I1={} I2={} I3={}  A={:4}  B={:5.2} V  supply={:5.2} V",
        on_off(s.digital[0]),
        on_off(s.digital[1]),
        on_off(s.digital[2]),
        s.analog_a,
        s.analog_b,
        s.battery
    )
}

fn print_status(s: &InputStatus) {
    let w = kv_width(&["I1:", "I2:", "I3:", "A:", "B:", "Supply:"], &[]);
    for (i, v) in s.digital.iter().enumerate() {
        kv(&format!("I{}:", i + 1), on_off(*v), w);
    }
    kv("A:", s.analog_a, w);
    kv("B:", format_args!("{:.2} V", s.analog_b), w);
    kv("Supply:", format_args!("{:.2} V", s.battery), w);
}

/// One status read for the watch loop.
///
/// Transient transport failures are logged and yield `None` so polling
/// continues; an unconfigured device is re-initialised for the next round.
pub(super) fn poll_once<D: RoboDevice>(lt: &mut RoboLt<D>) -> Result<Option<InputStatus>> {
    let e = match lt.read_status() {
        Ok(frame) => return Ok(Some(frame.status())),
        Err(e) => e,
    };
    if matches!(e, DeviceError::NotConfigured) {
        if let Err(e) = lt.reinit() {
            log::warn!("re-init failed: {e}");
        }
    }
    let e = RoboltError::from(e);
    if !e.is_transient() {
        return Err(e);
    }
    log::warn!("status read failed, retrying: {e}");
    Ok(None)
}

pub(super) fn cmd_inputs(opts: &Options, config: &Config, watch: bool) -> Result<()> {
    let mut lt = open_session(opts, config)?;

    if !watch {
        let status = lt.read_status()?.status();
        if opts.json {
            return print_json(&status);
        }
        print_status(&status);
        return Ok(());
    }

    let interval = Duration::from_millis(config.poll_interval_ms.max(1));
    log::info!("polling every {} ms", interval.as_millis());

    while RUNNING.load(Ordering::SeqCst) {
        if let Some(status) = poll_once(&mut lt)? {
            if opts.json {
                // One object per line so the stream can be piped.
                println!("{}", to_json(&status, false)?);
            } else {
                println!("{}", format_status_line(&status));
            }
        }
        std::thread::sleep(interval);
    }

    Ok(())
}
