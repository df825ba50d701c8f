//! robolt-lib — host-side driver for the Fischertechnik RoboLT USB interface.

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod session;

pub use device::{DeviceHandle, scan_for_devices};
pub use error::RoboltError;
pub use frame::Direction;
pub use session::RoboLt;
