//! RoboLT session — owns one device plus its output shadow registers.
//!
//! Mutators validate, update the shadow state, then transmit the whole
//! output frame. Accessors always issue a fresh status read; nothing is
//! cached.

use crate::device::{
    self, Backend, DeviceError, DeviceHandle, FirmwareVersion, RoboDevice, UsbBackend, UsbDevice,
};
use crate::error::Result;
use crate::frame::{Direction, InputFrame, OutputState};
use crate::protocol::*;

/// A connected RoboLT.
///
/// Not synchronised: share across threads only behind a lock.
pub struct RoboLt<D: RoboDevice> {
    device: D,
    outputs: OutputState,
}

/// Log a transport failure and hand it back unchanged.
fn logged<T>(what: &str, result: device::Result<T>) -> device::Result<T> {
    if let Err(ref e) = result {
        log::error!("{what}: {e}");
    }
    result
}

impl RoboLt<UsbDevice> {
    /// Attach to `handle`, or to the first RoboLT on the bus if `None`.
    pub fn open(handle: Option<DeviceHandle>) -> Result<Self> {
        Self::connect(&UsbBackend, handle)
    }

    /// Attach to the device matching `selector` (serial or path; empty = first).
    pub fn open_by(selector: &str) -> Result<Self> {
        Self::connect_by(&UsbBackend, selector)
    }
}

impl<D: RoboDevice> RoboLt<D> {
    /// Attach through `backend`. Discovery only runs when no handle is given.
    pub fn connect<B>(backend: &B, handle: Option<B::Handle>) -> Result<Self>
    where
        B: Backend<Device = D>,
    {
        let handle = match handle {
            Some(h) => h,
            None => backend
                .scan()
                .into_iter()
                .next()
                .ok_or(DeviceError::NotFound)?,
        };
        Ok(Self::new(backend.attach(handle)))
    }

    pub fn connect_by<B>(backend: &B, selector: &str) -> Result<Self>
    where
        B: Backend<Device = D>,
    {
        let handle = device::select_handle(backend, selector)?;
        Ok(Self::new(backend.attach(handle)))
    }

    /// Wrap a device and bring it to a known state (all outputs off).
    ///
    /// Initialisation failures are logged, not returned; the session can be
    /// re-initialised later with [`RoboLt::reinit`].
    pub fn new(device: D) -> Self {
        let mut session = RoboLt {
            device,
            outputs: OutputState::default(),
        };
        if let Err(e) = session.reinit() {
            log::error!("Could not init device: {e}");
        }
        session
    }

    /// Reconfigure the device and retransmit the current output state.
    pub fn reinit(&mut self) -> device::Result<()> {
        self.device.configure()?;
        self.transmit()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Current output shadow state (what was last sent, or attempted).
    pub fn outputs(&self) -> &OutputState {
        &self.outputs
    }

    fn transmit(&self) -> device::Result<()> {
        let frame = self.outputs.encode();
        log::debug!("{}: out {frame:02x?}", self.device.info().path);
        logged(
            "Could not write to RoboLT device",
            self.device.write_frame(&frame),
        )
    }

    fn info_block(&self, value: u16, length: usize) -> device::Result<Vec<u8>> {
        logged(
            "Could not send control transfer",
            self.device
                .control_in(CTRL_REQUEST_INFO, value, 0, length),
        )
    }

    /// Firmware version, as four dotted components.
    pub fn firmware_version(&self) -> device::Result<FirmwareVersion> {
        let resp = self.info_block(INFO_FIRMWARE, INFO_FIRMWARE_LEN)?;
        logged(
            "Could not decode firmware version",
            FirmwareVersion::from_response(&resp),
        )
    }

    /// Device serial number.
    pub fn serial(&self) -> device::Result<u32> {
        let resp = self.info_block(INFO_SERIAL, INFO_SERIAL_LEN)?;
        logged("Could not decode serial", device::decode_serial(&resp))
    }

    /// Set motor M1 or M2 direction and speed (0–100).
    pub fn set_motor(&mut self, id: u8, direction: Direction, speed: u8) -> Result<()> {
        self.outputs.set_motor(id, direction, speed)?;
        self.transmit()?;
        Ok(())
    }

    /// Set output O1–O4 state and PWM (0–100).
    pub fn set_output(&mut self, id: u8, state: bool, pwm: u8) -> Result<()> {
        self.outputs.set_output(id, state, pwm)?;
        self.transmit()?;
        Ok(())
    }

    /// Switch every channel off with a single transmission.
    pub fn all_off(&mut self) -> device::Result<()> {
        self.outputs = OutputState::default();
        self.transmit()
    }

    /// Read the 6 raw status bytes.
    pub fn read_raw(&self) -> device::Result<[u8; FRAME_SIZE]> {
        let raw = logged(
            "Could not read from RoboLT device",
            self.device.read_frame(),
        )?;
        log::debug!("{}: in {raw:02x?}", self.device.info().path);
        Ok(raw)
    }

    pub fn read_status(&self) -> device::Result<InputFrame> {
        self.read_raw().map(InputFrame::new)
    }

    /// Digital state of inputs I1, I2 and I3.
    pub fn read_digital_inputs(&self) -> device::Result<(bool, bool, bool)> {
        Ok(self.read_status()?.digital())
    }

    /// Analog input A (raw count) and B (volts).
    pub fn read_analog_inputs(&self) -> device::Result<(u16, f64)> {
        Ok(self.read_status()?.analog())
    }

    /// Supply voltage in volts.
    pub fn read_battery_voltage(&self) -> device::Result<f64> {
        Ok(self.read_status()?.battery())
    }
}
