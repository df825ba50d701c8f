//! `motor`, `output` and `off` subcommands.
//!
//! Each invocation opens a fresh session, so every channel not named on the
//! command line starts from off.

use super::{
    Config, Direction, Options, OutputsOutput, Result, RoboDevice, RoboLt, UsbDevice,
    open_session, print_json,
};

fn report(opts: &Options, lt: &RoboLt<UsbDevice>, summary: String) -> Result<()> {
    if opts.json {
        return print_json(&OutputsOutput {
            path: lt.device().info().path.clone(),
            outputs: lt.outputs().clone(),
        });
    }
    println!("{summary}");
    Ok(())
}

pub(super) fn cmd_motor(
    opts: &Options,
    config: &Config,
    id: u8,
    direction: Direction,
    speed: u8,
) -> Result<()> {
    let mut lt = open_session(opts, config)?;
    lt.set_motor(id, direction, speed)?;
    report(opts, &lt, format!("M{id}: {direction} at {speed}%"))
}

pub(super) fn cmd_output(
    opts: &Options,
    config: &Config,
    id: u8,
    state: bool,
    pwm: u8,
) -> Result<()> {
    let mut lt = open_session(opts, config)?;
    lt.set_output(id, state, pwm)?;
    let summary = if state {
        format!("O{id}: on at {pwm}%")
    } else {
        format!("O{id}: off")
    };
    report(opts, &lt, summary)
}

pub(super) fn cmd_off(opts: &Options, config: &Config) -> Result<()> {
    let mut lt = open_session(opts, config)?;
    lt.all_off()?;
    report(opts, &lt, "All outputs off".to_string())
}
