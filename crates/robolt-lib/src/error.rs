//! Unified error type for the robolt-lib crate.
//!
//! [`RoboltError`] wraps the transport error ([`DeviceError`]) and argument
//! validation failures ([`ValidationError`]). `From` impls allow `?` to
//! propagate across module boundaries.

use std::fmt;

use crate::device::DeviceError;

/// An argument was rejected before any state was touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Motor id outside `1..=2`.
    MotorId(u8),
    /// Output id outside `1..=4`.
    OutputId(u8),
    /// Direction code outside `0..=3`, or an unknown direction name.
    Direction(String),
    /// Motor speed above 100.
    Speed(u8),
    /// Output PWM above 100.
    Pwm(u8),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MotorId(id) => write!(f, "Motor id out of range: {id} (expected 1-2)"),
            ValidationError::OutputId(id) => {
                write!(f, "Output id out of range: {id} (expected 1-4)")
            }
            ValidationError::Direction(d) => write!(
                f,
                "Illegal motor direction: {d} (expected off, left, right or brake)"
            ),
            ValidationError::Speed(s) => write!(f, "Motor speed out of range: {s} (expected 0-100)"),
            ValidationError::Pwm(p) => write!(f, "Output pwm out of range: {p} (expected 0-100)"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Unified error type for robolt-lib operations.
#[derive(Debug)]
pub enum RoboltError {
    /// USB discovery, configuration or transfer error.
    Device(DeviceError),
    /// Out-of-range argument to a mutator.
    Validation(ValidationError),
    /// Standard I/O error (config persistence).
    Io(std::io::Error),
    /// Configuration error.
    Config(String),
}

impl fmt::Display for RoboltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoboltError::Device(e) => write!(f, "{e}"),
            RoboltError::Validation(e) => write!(f, "{e}"),
            RoboltError::Io(e) => write!(f, "I/O error: {e}"),
            RoboltError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for RoboltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RoboltError::Device(e) => Some(e),
            RoboltError::Validation(e) => Some(e),
            RoboltError::Io(e) => Some(e),
            RoboltError::Config(_) => None,
        }
    }
}

impl From<DeviceError> for RoboltError {
    fn from(e: DeviceError) -> Self {
        RoboltError::Device(e)
    }
}

impl From<ValidationError> for RoboltError {
    fn from(e: ValidationError) -> Self {
        RoboltError::Validation(e)
    }
}

impl From<std::io::Error> for RoboltError {
    fn from(e: std::io::Error) -> Self {
        RoboltError::Io(e)
    }
}

impl RoboltError {
    /// True for transport failures the caller may simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RoboltError::Device(DeviceError::TransferFailed(_) | DeviceError::NotConfigured)
        )
    }
}

/// Crate-level Result alias using [`RoboltError`].
pub type Result<T> = std::result::Result<T, RoboltError>;
