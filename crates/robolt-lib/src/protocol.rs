//! Protocol constants for the Fischertechnik RoboLT interface.
//!
//! The RoboLT speaks no framing beyond two fixed 6-byte interrupt frames and
//! two vendor control requests. Everything the host needs to know lives here.
//!
//! ## Output frame (interrupt OUT)
//!
//! `[0xF2, enable, duty_lo, duty_hi, 0, 0]`
//!
//! - `enable`: bit *n* set = channel *n* driver active (channels 0–3).
//! - duties: four 3-bit values packed back to back starting at bit 0 of
//!   byte 2 (channel 2 straddles the byte boundary).
//!
//! ## Status frame (interrupt IN)
//!
//! `[digital, a_lo, b_lo, batt_lo, high_bits, reserved]`
//!
//! - `digital`: bits 0–2 = I1–I3.
//! - `high_bits`: bits 0–1 = A high, bits 2–3 = B high, bits 4–5 = battery high.

// ── USB identification ──

/// Fischertechnik vendor ID.
pub const ROBOLT_VID: u16 = 0x146a;

/// RoboLT product ID.
pub const ROBOLT_PID: u16 = 0x000a;

/// Interface carrying both interrupt endpoints.
pub const ROBOLT_INTERFACE: u8 = 0;

/// Alternate setting of [`ROBOLT_INTERFACE`] holding the endpoints.
pub const ROBOLT_ALT_SETTING: u8 = 0;

// ── Interrupt frames ──

/// Size of both the command and status frames.
pub const FRAME_SIZE: usize = 6;

/// First byte of every output frame.
pub const CMD_SET_OUTPUTS: u8 = 0xf2;

/// Number of output channels (M1a, M1b, M2a, M2b / O1–O4).
pub const CHANNEL_COUNT: usize = 4;

/// Number of motors; each drives a pair of adjacent channels.
pub const MOTOR_COUNT: u8 = 2;

/// Number of digital inputs reported in the status frame.
pub const DIGITAL_INPUT_COUNT: usize = 3;

/// Upper bound for speed / PWM percentages.
pub const MAX_DUTY: u8 = 100;

/// Hardware PWM resolution. Duty is scaled as `duty * PWM_STEPS / (MAX_DUTY + 1)`.
pub const PWM_STEPS: u16 = 8;

/// Bits occupied by one scaled duty value in the output frame.
pub const PWM_BITS: u32 = 3;

/// Volts per ADC count for analog input B and the supply voltage.
pub const ANALOG_SCALE: f64 = 0.03;

// ── Control transfers ──

/// Vendor request shared by all info queries (bmRequestType `0xC0`).
pub const CTRL_REQUEST_INFO: u8 = 0xf0;

/// wValue selecting the firmware version block.
pub const INFO_FIRMWARE: u16 = 0x0001;

/// Bytes requested for the firmware version block.
pub const INFO_FIRMWARE_LEN: usize = 5;

/// wValue selecting the serial number block.
pub const INFO_SERIAL: u16 = 0x0002;

/// Bytes requested for the serial number block.
pub const INFO_SERIAL_LEN: usize = 14;

/// Timeout for every control and interrupt transfer issued by the USB backend.
pub const USB_TIMEOUT_MS: u64 = 1000;
