//! Output/status frame codec and the output shadow state.
//!
//! [`OutputState`] is the host-side copy of everything the RoboLT is told to
//! drive. It is always transmitted whole; the device has no partial update.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ValidationError;
use crate::protocol::*;

// ── Direction ──

/// Motor direction. The code doubles as the enable bits of a motor pair:
/// bit 0 drives winding A, bit 1 drives winding B.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Off = 0,
    Left = 1,
    Right = 2,
    Brake = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Off,
        Direction::Left,
        Direction::Right,
        Direction::Brake,
    ];

    /// Raw direction code (0–3).
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Enable bits for winding A and winding B.
    pub fn enable_bits(self) -> (bool, bool) {
        let code = self.code();
        (code & 1 != 0, code & 2 != 0)
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Off => "off",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Brake => "brake",
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Direction::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| ValidationError::Direction(code.to_string()))
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    /// Accepts a direction name (case-insensitive) or its numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(dir) = Direction::ALL
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(s))
        {
            return Ok(*dir);
        }
        s.parse::<u8>()
            .map_err(|_| ValidationError::Direction(s.to_string()))
            .and_then(Direction::try_from)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Output frame ──

/// Rescale a 0–100 duty to the 3-bit hardware resolution.
///
/// Truncating: `floor(duty * 8 / 101)`, so 0 → 0 and 100 → 7.
pub fn scale_duty(duty: u8) -> u8 {
    (u16::from(duty) * PWM_STEPS / (u16::from(MAX_DUTY) + 1)) as u8
}

/// Enable and duty shadow registers for the four output channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputState {
    enable: [bool; CHANNEL_COUNT],
    duty: [u8; CHANNEL_COUNT],
}

impl OutputState {
    /// Build a state from explicit registers, rejecting duties above 100.
    pub fn new(
        enable: [bool; CHANNEL_COUNT],
        duty: [u8; CHANNEL_COUNT],
    ) -> Result<Self, ValidationError> {
        if let Some(&bad) = duty.iter().find(|&&d| d > MAX_DUTY) {
            return Err(ValidationError::Pwm(bad));
        }
        Ok(OutputState { enable, duty })
    }

    pub fn enable(&self) -> &[bool; CHANNEL_COUNT] {
        &self.enable
    }

    pub fn duty(&self) -> &[u8; CHANNEL_COUNT] {
        &self.duty
    }

    /// Point motor `id` (1-based) in `direction` at `speed` percent.
    ///
    /// All arguments are checked before either channel of the pair changes.
    pub fn set_motor(
        &mut self,
        id: u8,
        direction: Direction,
        speed: u8,
    ) -> Result<(), ValidationError> {
        if !(1..=MOTOR_COUNT).contains(&id) {
            return Err(ValidationError::MotorId(id));
        }
        if speed > MAX_DUTY {
            return Err(ValidationError::Speed(speed));
        }

        let a = 2 * (id as usize - 1);
        let (enable_a, enable_b) = direction.enable_bits();
        self.enable[a] = enable_a;
        self.enable[a + 1] = enable_b;
        self.duty[a] = speed;
        self.duty[a + 1] = speed;
        Ok(())
    }

    /// Switch output `id` (1-based) on or off with the given PWM percent.
    pub fn set_output(&mut self, id: u8, state: bool, pwm: u8) -> Result<(), ValidationError> {
        if !(1..=CHANNEL_COUNT as u8).contains(&id) {
            return Err(ValidationError::OutputId(id));
        }
        if pwm > MAX_DUTY {
            return Err(ValidationError::Pwm(pwm));
        }

        let ch = id as usize - 1;
        self.enable[ch] = state;
        self.duty[ch] = pwm;
        Ok(())
    }

    /// Direction currently encoded on motor `id`'s channel pair.
    pub fn motor_direction(&self, id: u8) -> Option<Direction> {
        if !(1..=MOTOR_COUNT).contains(&id) {
            return None;
        }
        let a = 2 * (id as usize - 1);
        let code = u8::from(self.enable[a]) | (u8::from(self.enable[a + 1]) << 1);
        Direction::try_from(code).ok()
    }

    /// Assemble the 6-byte interrupt OUT frame.
    pub fn encode(&self) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        frame[0] = CMD_SET_OUTPUTS;

        for (i, &on) in self.enable.iter().enumerate() {
            if on {
                frame[1] |= 1 << i;
            }
        }

        // Four 3-bit duties, packed LSB-first across bytes 2..4.
        let packed = self
            .duty
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, &d)| {
                acc | (u16::from(scale_duty(d)) << (i as u32 * PWM_BITS))
            });
        frame[2..4].copy_from_slice(&packed.to_le_bytes());

        frame
    }
}

// ── Status frame ──

/// One raw status read from the interrupt IN endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputFrame([u8; FRAME_SIZE]);

/// Decoded view of an [`InputFrame`], for display and JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputStatus {
    pub digital: [bool; DIGITAL_INPUT_COUNT],
    pub analog_a: u16,
    pub analog_b: f64,
    pub battery: f64,
}

impl InputFrame {
    pub fn new(raw: [u8; FRAME_SIZE]) -> Self {
        InputFrame(raw)
    }

    /// Build from a transfer buffer. Returns `None` if fewer than 6 bytes arrived.
    pub fn from_slice(raw: &[u8]) -> Option<Self> {
        raw.get(..FRAME_SIZE)
            .and_then(|b| b.try_into().ok())
            .map(InputFrame)
    }

    pub fn raw(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    /// 10-bit value from a low byte plus two high bits taken from byte 4.
    fn ten_bit(&self, low: usize, high_shift: u8) -> u16 {
        u16::from(self.0[low]) + 256 * u16::from((self.0[4] >> high_shift) & 0x3)
    }

    /// Digital state of I1, I2, I3.
    pub fn digital(&self) -> (bool, bool, bool) {
        let bits = self.0[0];
        (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0)
    }

    /// Raw ADC count of analog channel A.
    pub fn analog_a(&self) -> u16 {
        self.ten_bit(1, 0)
    }

    /// Raw ADC count of analog channel B.
    pub fn analog_b_raw(&self) -> u16 {
        self.ten_bit(2, 2)
    }

    /// Raw ADC count of the supply voltage.
    pub fn battery_raw(&self) -> u16 {
        self.ten_bit(3, 4)
    }

    /// Channel A as a raw count and channel B scaled to volts.
    pub fn analog(&self) -> (u16, f64) {
        (
            self.analog_a(),
            ANALOG_SCALE * f64::from(self.analog_b_raw()),
        )
    }

    /// Supply voltage in volts.
    pub fn battery(&self) -> f64 {
        ANALOG_SCALE * f64::from(self.battery_raw())
    }

    pub fn status(&self) -> InputStatus {
        let (i1, i2, i3) = self.digital();
        let (analog_a, analog_b) = self.analog();
        InputStatus {
            digital: [i1, i2, i3],
            analog_a,
            analog_b,
            battery: self.battery(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ── scale_duty ──

    #[test]
    fn scale_duty_endpoints() {
        assert_eq!(scale_duty(0), 0);
        assert_eq!(scale_duty(100), 7);
    }

    #[test]
    fn scale_duty_always_fits_three_bits() {
        for d in 0..=MAX_DUTY {
            assert!(scale_duty(d) <= 7, "duty {d} scaled out of range");
        }
    }

    #[test]
    fn scale_duty_truncates() {
        // 12 * 8 / 101 = 0.95 → 0, 13 * 8 / 101 = 1.03 → 1
        assert_eq!(scale_duty(12), 0);
        assert_eq!(scale_duty(13), 1);
        assert_eq!(scale_duty(50), 3);
        assert_eq!(scale_duty(25), 1);
        assert_eq!(scale_duty(88), 6);
        assert_eq!(scale_duty(89), 7);
    }

    // ── Direction ──

    #[test]
    fn direction_enable_bits() {
        assert_eq!(Direction::Off.enable_bits(), (false, false));
        assert_eq!(Direction::Left.enable_bits(), (true, false));
        assert_eq!(Direction::Right.enable_bits(), (false, true));
        assert_eq!(Direction::Brake.enable_bits(), (true, true));
    }

    #[test]
    fn direction_try_from_code() {
        for code in 0..4u8 {
            assert_eq!(Direction::try_from(code).unwrap().code(), code);
        }
        assert_eq!(
            Direction::try_from(4),
            Err(ValidationError::Direction("4".into()))
        );
    }

    #[test]
    fn direction_from_str() {
        assert_eq!("left".parse::<Direction>().unwrap(), Direction::Left);
        assert_eq!("BRAKE".parse::<Direction>().unwrap(), Direction::Brake);
        assert_eq!(" off ".parse::<Direction>().unwrap(), Direction::Off);
        assert_eq!("2".parse::<Direction>().unwrap(), Direction::Right);
        assert!("reverse".parse::<Direction>().is_err());
        assert!("7".parse::<Direction>().is_err());
    }

    #[test]
    fn direction_display_round_trips() {
        for d in Direction::ALL {
            assert_eq!(d.to_string().parse::<Direction>().unwrap(), d);
        }
    }

    // ── OutputState ──

    #[test]
    fn default_state_encodes_all_off() {
        assert_eq!(OutputState::default().encode(), [0xf2, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn encode_golden_frame() {
        let state = OutputState::new([true, false, true, false], [0, 100, 50, 25]).unwrap();
        // scaled duties: 0, 7, 3, 1
        // byte2 = 0 | 7<<3 | (3<<6 & 0xff) = 0x38 | 0xC0 = 0xF8
        // byte3 = 3>>2 | 1<<1 = 0x02
        assert_eq!(state.encode(), [0xf2, 0x05, 0xf8, 0x02, 0x00, 0x00]);
    }

    #[test]
    fn encode_full_duty_all_channels() {
        let state = OutputState::new([true; 4], [100; 4]).unwrap();
        // 7 | 7<<3 | 7<<6 | 7<<9 = 0x0FFF
        assert_eq!(state.encode(), [0xf2, 0x0f, 0xff, 0x0f, 0x00, 0x00]);
    }

    #[test]
    fn encode_channel_two_straddles_bytes() {
        let state = OutputState::new([false; 4], [0, 0, 100, 0]).unwrap();
        // 7 << 6 = 0x01C0
        assert_eq!(state.encode(), [0xf2, 0x00, 0xc0, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn new_rejects_duty_above_max() {
        assert_eq!(
            OutputState::new([false; 4], [0, 101, 0, 0]),
            Err(ValidationError::Pwm(101))
        );
    }

    #[test]
    fn set_motor_touches_only_its_pair() {
        for id in 1..=2u8 {
            for dir in Direction::ALL {
                let mut state = OutputState::new([true; 4], [42; 4]).unwrap();
                state.set_motor(id, dir, 60).unwrap();

                let a = 2 * (id as usize - 1);
                let other = if id == 1 { 2 } else { 0 };
                let code = dir.code();
                assert_eq!(state.enable()[a], code & 1 != 0);
                assert_eq!(state.enable()[a + 1], code & 2 != 0);
                assert_eq!(state.duty()[a], 60);
                assert_eq!(state.duty()[a + 1], 60);
                assert!(state.enable()[other] && state.enable()[other + 1]);
                assert_eq!(state.duty()[other], 42);
                assert_eq!(state.duty()[other + 1], 42);
                assert_eq!(state.motor_direction(id), Some(dir));
            }
        }
    }

    #[test]
    fn set_motor_rejects_bad_arguments_without_mutation() {
        let mut state = OutputState::new([true, false, true, false], [10, 20, 30, 40]).unwrap();
        let before = state.clone();

        assert_eq!(
            state.set_motor(0, Direction::Left, 10),
            Err(ValidationError::MotorId(0))
        );
        assert_eq!(
            state.set_motor(3, Direction::Left, 10),
            Err(ValidationError::MotorId(3))
        );
        assert_eq!(
            state.set_motor(1, Direction::Left, 101),
            Err(ValidationError::Speed(101))
        );
        assert_eq!(state, before);
    }

    #[test]
    fn set_output_updates_single_channel() {
        let mut state = OutputState::default();
        state.set_output(3, true, 75).unwrap();
        assert_eq!(state.enable(), &[false, false, true, false]);
        assert_eq!(state.duty(), &[0, 0, 75, 0]);

        state.set_output(3, false, 0).unwrap();
        assert_eq!(state, OutputState::default());
    }

    #[test]
    fn set_output_rejects_bad_arguments_without_mutation() {
        let mut state = OutputState::default();
        state.set_output(1, true, 100).unwrap();
        let before = state.clone();

        assert_eq!(
            state.set_output(0, true, 10),
            Err(ValidationError::OutputId(0))
        );
        assert_eq!(
            state.set_output(5, true, 10),
            Err(ValidationError::OutputId(5))
        );
        assert_eq!(
            state.set_output(2, true, 101),
            Err(ValidationError::Pwm(101))
        );
        assert_eq!(state, before);
    }

    #[test]
    fn motor_direction_out_of_range_is_none() {
        assert_eq!(OutputState::default().motor_direction(0), None);
        assert_eq!(OutputState::default().motor_direction(3), None);
    }

    // ── InputFrame ──

    #[test]
    fn decode_golden_status() {
        let frame = InputFrame::new([0x05, 10, 20, 30, 0b00_01_10_11, 0]);
        assert_eq!(frame.digital(), (true, false, true));

        // A = 10 + 256 * 0b11
        assert_eq!(frame.analog_a(), 778);
        // B = 20 + 256 * 0b10 = 532 counts
        assert_eq!(frame.analog_b_raw(), 532);
        // battery = 30 + 256 * 0b01 = 286 counts
        assert_eq!(frame.battery_raw(), 286);

        let (a, b) = frame.analog();
        assert_eq!(a, 778);
        assert!(approx(b, 15.96), "analog B = {b}");
        assert!(approx(frame.battery(), 8.58), "battery = {}", frame.battery());
    }

    #[test]
    fn decode_ignores_upper_bits_of_high_byte() {
        let frame = InputFrame::new([0xf8, 0, 0, 0, 0b1100_0000, 0xff]);
        assert_eq!(frame.digital(), (false, false, false));
        assert_eq!(frame.analog_a(), 0);
        assert_eq!(frame.analog_b_raw(), 0);
        assert_eq!(frame.battery_raw(), 0);
    }

    #[test]
    fn decode_maximum_counts() {
        let frame = InputFrame::new([0x07, 0xff, 0xff, 0xff, 0x3f, 0]);
        assert_eq!(frame.digital(), (true, true, true));
        assert_eq!(frame.analog_a(), 1023);
        assert_eq!(frame.analog_b_raw(), 1023);
        assert_eq!(frame.battery_raw(), 1023);
    }

    #[test]
    fn from_slice_requires_six_bytes() {
        assert!(InputFrame::from_slice(&[1, 2, 3, 4, 5]).is_none());
        let frame = InputFrame::from_slice(&[1, 2, 3, 4, 5, 6, 7]).unwrap();
        assert_eq!(frame.raw(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn status_serializes_all_fields() {
        let status = InputFrame::new([0x02, 1, 0, 100, 0, 0]).status();
        assert_eq!(status.digital, [false, true, false]);
        let json = serde_json::to_value(&status).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(json["analog_a"], 1);
        assert_eq!(json["digital"][1], true);
    }
}
