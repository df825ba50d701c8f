//! Device communication — transport trait, discovery and the nusb backend.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::frame::InputFrame;
use crate::protocol::*;

// ── Error type ──

/// Device communication errors.
///
/// String payloads follow the convention **"context: details"** where *context*
/// identifies the operation or step (e.g. `"USB open"`, `"interrupt in 0x81"`)
/// and *details* describes what went wrong.
#[derive(Debug)]
pub enum DeviceError {
    NotFound,
    OpenFailed(String),
    InitFailed(String),
    /// The device has not been (successfully) configured yet.
    NotConfigured,
    /// A control or interrupt transfer failed. Non-fatal: the caller may retry.
    TransferFailed(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::NotFound => write!(f, "Could not find a connected RoboLT device"),
            DeviceError::OpenFailed(e) => write!(f, "Failed to open device: {e}"),
            DeviceError::InitFailed(e) => write!(f, "Device init failed: {e}"),
            DeviceError::NotConfigured => write!(f, "Device is not configured"),
            DeviceError::TransferFailed(e) => write!(f, "Transfer failed: {e}"),
        }
    }
}

impl std::error::Error for DeviceError {}

pub type Result<T> = std::result::Result<T, DeviceError>;

// ── Device info ──

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceInfo {
    /// Bus location, e.g. `usb:001/004`.
    pub path: String,
    /// USB serial string descriptor, if the device reports one.
    pub serial: Option<String>,
    /// USB product string descriptor.
    pub product: Option<String>,
}

/// Firmware version reported by the info control request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion(pub [u8; 4]);

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

impl FirmwareVersion {
    /// Parse bytes 1–4 of the firmware info response. Byte 0 is a status byte.
    pub fn from_response(resp: &[u8]) -> Result<Self> {
        resp.get(1..5)
            .and_then(|b| b.try_into().ok())
            .map(FirmwareVersion)
            .ok_or_else(|| {
                DeviceError::TransferFailed(format!(
                    "firmware info: short response ({} of {INFO_FIRMWARE_LEN} bytes)",
                    resp.len()
                ))
            })
    }
}

/// Decode the serial number from the serial info response.
///
/// Bytes 1–3 are base-100 digits, least significant first. The remaining
/// bytes of the 14-byte block are not interpreted.
pub fn decode_serial(resp: &[u8]) -> Result<u32> {
    match resp.get(1..4) {
        Some(&[lo, mid, hi]) => {
            Ok(u32::from(lo) + u32::from(mid) * 100 + u32::from(hi) * 10_000)
        }
        _ => Err(DeviceError::TransferFailed(format!(
            "serial info: short response ({} of {INFO_SERIAL_LEN} bytes)",
            resp.len()
        ))),
    }
}

/// True if a USB VID/PID pair identifies a RoboLT.
pub fn is_robolt(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == ROBOLT_VID && product_id == ROBOLT_PID
}

/// Drive a transfer future to completion on `rt`, giving up after `timeout`.
///
/// A pending nusb transfer is cancelled when its future is dropped, so a
/// timed-out transfer does not linger on the endpoint.
fn complete_within<F: Future>(
    rt: &tokio::runtime::Runtime,
    timeout: Duration,
    what: &str,
    transfer: F,
) -> Result<F::Output> {
    rt.block_on(async { tokio::time::timeout(timeout, transfer).await })
        .map_err(|_| {
            DeviceError::TransferFailed(format!(
                "{what}: timed out after {} ms",
                timeout.as_millis()
            ))
        })
}

// ── Traits ──

/// One RoboLT unit: two interrupt endpoints plus vendor control requests.
pub trait RoboDevice {
    fn info(&self) -> &DeviceInfo;

    /// Select the default configuration and resolve both interrupt endpoints.
    /// May be called again to re-initialise after a failure.
    fn configure(&mut self) -> Result<()>;

    /// Vendor device-to-host control request (bmRequestType `0xC0`).
    fn control_in(&self, request: u8, value: u16, index: u16, length: usize) -> Result<Vec<u8>>;

    /// Send one command frame on the interrupt OUT endpoint.
    fn write_frame(&self, frame: &[u8; FRAME_SIZE]) -> Result<()>;

    /// Read one status frame from the interrupt IN endpoint.
    fn read_frame(&self) -> Result<[u8; FRAME_SIZE]>;
}

/// A source of RoboLT units.
///
/// Discovery and attachment are split so a caller holding a handle never
/// goes back to the bus.
pub trait Backend {
    type Handle;
    type Device: RoboDevice;

    /// Enumerate matching devices. Errors are logged, never returned.
    fn scan(&self) -> Vec<Self::Handle>;

    fn describe(&self, handle: &Self::Handle) -> DiscoveredDevice;

    /// Wrap a handle in an (unconfigured) device. Performs no I/O.
    fn attach(&self, handle: Self::Handle) -> Self::Device;
}

// ── Device enumeration ──

/// A discovered RoboLT (not yet opened).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Bus location, e.g. `usb:001/004`.
    pub path: String,
    /// USB serial number, if available.
    pub serial: Option<String>,
}

impl DiscoveredDevice {
    /// True if `selector` names this device by serial (case-insensitive) or path.
    pub fn matches(&self, selector: &str) -> bool {
        self.path == selector
            || self
                .serial
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(selector))
    }
}

/// Pick a handle from `backend` by serial or path.
///
/// An empty selector picks the first device found.
pub fn select_handle<B: Backend>(backend: &B, selector: &str) -> Result<B::Handle> {
    let selector = selector.trim();
    let mut handles = backend.scan();
    if handles.is_empty() {
        return Err(DeviceError::NotFound);
    }
    if selector.is_empty() {
        return Ok(handles.swap_remove(0));
    }

    let described: Vec<DiscoveredDevice> = handles.iter().map(|h| backend.describe(h)).collect();
    match described.iter().position(|d| d.matches(selector)) {
        Some(i) => Ok(handles.swap_remove(i)),
        None => {
            let available: Vec<String> = described
                .iter()
                .map(|d| match &d.serial {
                    Some(s) => format!("{} ({s})", d.path),
                    None => d.path.clone(),
                })
                .collect();
            Err(DeviceError::OpenFailed(format!(
                "no device matching '{selector}' (available: {})",
                available.join(", ")
            )))
        }
    }
}

// ── USB implementation ──

mod usb_impl {
    use super::*;

    use nusb::transfer::{Control, ControlType, Recipient, RequestBuffer};

    /// Opaque reference to an attached RoboLT, as returned by [`scan_for_devices`].
    #[derive(Debug, Clone)]
    pub struct DeviceHandle {
        usb: nusb::DeviceInfo,
    }

    impl DeviceHandle {
        pub fn path(&self) -> String {
            format!(
                "usb:{:03}/{:03}",
                self.usb.bus_number(),
                self.usb.device_address()
            )
        }

        pub fn serial(&self) -> Option<&str> {
            self.usb.serial_number()
        }

        pub fn describe(&self) -> DiscoveredDevice {
            DiscoveredDevice {
                path: self.path(),
                serial: self.serial().map(|s| s.to_string()),
            }
        }
    }

    /// Find all attached RoboLT devices.
    ///
    /// Enumeration errors are logged and yield an empty list.
    pub fn scan_for_devices() -> Vec<DeviceHandle> {
        let devices = match nusb::list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                log::error!("Could not find a connected RoboLT device: {e}");
                return Vec::new();
            }
        };

        devices
            .filter(|dev| is_robolt(dev.vendor_id(), dev.product_id()))
            .map(|usb| DeviceHandle { usb })
            .collect()
    }

    /// Everything that only exists once the device is configured.
    struct Link {
        interface: nusb::Interface,
        endpoint_in: u8,
        endpoint_out: u8,
        // Timer driver for interrupt transfers; nusb futures are runtime-agnostic.
        rt: tokio::runtime::Runtime,
        // Keeps the device open for as long as the interface is claimed.
        _device: nusb::Device,
    }

    pub struct UsbDevice {
        handle: DeviceHandle,
        info: DeviceInfo,
        link: Option<Link>,
    }

    impl UsbDevice {
        pub fn new(handle: DeviceHandle) -> Self {
            let info = DeviceInfo {
                path: handle.path(),
                serial: handle.serial().map(|s| s.to_string()),
                product: handle.usb.product_string().map(|s| s.to_string()),
            };
            UsbDevice {
                handle,
                info,
                link: None,
            }
        }

        fn link(&self) -> Result<&Link> {
            self.link.as_ref().ok_or(DeviceError::NotConfigured)
        }

        fn open_link(&self) -> Result<Link> {
            let device = self
                .handle
                .usb
                .open()
                .map_err(|e| DeviceError::OpenFailed(format!("USB open: {e}")))?;

            // Same choice as libusb's default: the first configuration descriptor.
            let config_value = device
                .configurations()
                .next()
                .map(|c| c.configuration_value())
                .ok_or_else(|| DeviceError::InitFailed("no configuration descriptor".into()))?;
            device.set_configuration(config_value).map_err(|e| {
                DeviceError::InitFailed(format!("set configuration {config_value}: {e}"))
            })?;

            let config = device
                .active_configuration()
                .map_err(|e| DeviceError::InitFailed(format!("active configuration: {e}")))?;
            let alt = config
                .interface_alt_settings()
                .find(|alt| {
                    alt.interface_number() == ROBOLT_INTERFACE
                        && alt.alternate_setting() == ROBOLT_ALT_SETTING
                })
                .ok_or_else(|| {
                    DeviceError::InitFailed(format!(
                        "interface ({ROBOLT_INTERFACE}, {ROBOLT_ALT_SETTING}) not found"
                    ))
                })?;

            // The firmware lists the IN endpoint first, then OUT.
            let addresses: Vec<u8> = alt.endpoints().map(|ep| ep.address()).collect();
            let (endpoint_in, endpoint_out) = match addresses[..] {
                [ep_in, ep_out, ..] => (ep_in, ep_out),
                _ => {
                    return Err(DeviceError::InitFailed(format!(
                        "expected two endpoints, found {}",
                        addresses.len()
                    )));
                }
            };
            if endpoint_in & 0x80 == 0 || endpoint_out & 0x80 != 0 {
                log::warn!(
                    "unexpected endpoint directions: in=0x{endpoint_in:02x} out=0x{endpoint_out:02x}"
                );
            }

            let interface = device.claim_interface(ROBOLT_INTERFACE).map_err(|e| {
                DeviceError::InitFailed(format!("claim interface {ROBOLT_INTERFACE}: {e}"))
            })?;

            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(|e| DeviceError::InitFailed(format!("transfer runtime: {e}")))?;

            log::debug!(
                "{}: configuration {config_value}, in=0x{endpoint_in:02x} out=0x{endpoint_out:02x}",
                self.info.path
            );

            Ok(Link {
                interface,
                endpoint_in,
                endpoint_out,
                rt,
                _device: device,
            })
        }
    }

    impl RoboDevice for UsbDevice {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn configure(&mut self) -> Result<()> {
            // Release the old claim before touching the configuration again.
            self.link = None;
            self.link = Some(self.open_link()?);
            Ok(())
        }

        fn control_in(
            &self,
            request: u8,
            value: u16,
            index: u16,
            length: usize,
        ) -> Result<Vec<u8>> {
            let link = self.link()?;
            let control = Control {
                control_type: ControlType::Vendor,
                recipient: Recipient::Device,
                request,
                value,
                index,
            };
            let mut buf = vec![0u8; length];
            let n = link
                .interface
                .control_in_blocking(control, &mut buf, Duration::from_millis(USB_TIMEOUT_MS))
                .map_err(|e| {
                    DeviceError::TransferFailed(format!(
                        "control_in(bRequest=0x{request:02x}, wValue={value}): {e}"
                    ))
                })?;
            buf.truncate(n);
            Ok(buf)
        }

        fn write_frame(&self, frame: &[u8; FRAME_SIZE]) -> Result<()> {
            let link = self.link()?;
            let what = format!("interrupt out 0x{:02x}", link.endpoint_out);
            complete_within(
                &link.rt,
                Duration::from_millis(USB_TIMEOUT_MS),
                &what,
                link.interface.interrupt_out(link.endpoint_out, frame.to_vec()),
            )?
            .into_result()
            .map_err(|e| DeviceError::TransferFailed(format!("{what}: {e}")))?;
            Ok(())
        }

        fn read_frame(&self) -> Result<[u8; FRAME_SIZE]> {
            let link = self.link()?;
            let what = format!("interrupt in 0x{:02x}", link.endpoint_in);
            let data = complete_within(
                &link.rt,
                Duration::from_millis(USB_TIMEOUT_MS),
                &what,
                link.interface
                    .interrupt_in(link.endpoint_in, RequestBuffer::new(FRAME_SIZE)),
            )?
            .into_result()
            .map_err(|e| DeviceError::TransferFailed(format!("{what}: {e}")))?;

            InputFrame::from_slice(&data)
                .map(|frame| *frame.raw())
                .ok_or_else(|| {
                    DeviceError::TransferFailed(format!(
                        "{what}: short read ({} of {FRAME_SIZE} bytes)",
                        data.len()
                    ))
                })
        }
    }

    /// The host USB bus, via nusb.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UsbBackend;

    impl Backend for UsbBackend {
        type Handle = DeviceHandle;
        type Device = UsbDevice;

        fn scan(&self) -> Vec<DeviceHandle> {
            scan_for_devices()
        }

        fn describe(&self, handle: &DeviceHandle) -> DiscoveredDevice {
            handle.describe()
        }

        fn attach(&self, handle: DeviceHandle) -> UsbDevice {
            UsbDevice::new(handle)
        }
    }
}

pub use usb_impl::{DeviceHandle, UsbBackend, UsbDevice, scan_for_devices};

/// List attached RoboLT devices without opening them.
pub fn enumerate_devices() -> Vec<DiscoveredDevice> {
    scan_for_devices()
        .iter()
        .map(DeviceHandle::describe)
        .collect()
}

// ── Mock device for testing ──

/// In-memory mock device and backend for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, VecDeque};

    /// In-memory RoboLT. Every written frame is recorded; reads pop from a
    /// queue filled by the test; control responses are keyed by wValue.
    pub struct MockDevice {
        info: DeviceInfo,
        /// Number of `configure()` calls.
        pub configure_calls: Cell<u32>,
        pub configured: Cell<bool>,
        /// Recorded OUT frames, oldest first.
        pub written: RefCell<Vec<[u8; FRAME_SIZE]>>,
        /// Queued IN frames, consumed front to back.
        pub reads: RefCell<VecDeque<[u8; FRAME_SIZE]>>,
        /// Control responses: wValue → response bytes.
        pub control_responses: RefCell<HashMap<u16, Vec<u8>>>,
        /// Recorded control requests: (bRequest, wValue, wIndex, length).
        pub control_requests: RefCell<Vec<(u8, u16, u16, usize)>>,
        pub fail_configure: Cell<bool>,
        pub fail_writes: Cell<bool>,
        pub fail_reads: Cell<bool>,
    }

    impl Default for MockDevice {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockDevice {
        pub fn new() -> Self {
            Self::with_path("mock://robolt")
        }

        pub fn with_path(path: &str) -> Self {
            MockDevice {
                info: DeviceInfo {
                    path: path.into(),
                    serial: Some("MOCK123".into()),
                    product: Some("ROBO LT Controller".into()),
                },
                configure_calls: Cell::new(0),
                configured: Cell::new(false),
                written: RefCell::new(Vec::new()),
                reads: RefCell::new(VecDeque::new()),
                control_responses: RefCell::new(HashMap::new()),
                control_requests: RefCell::new(Vec::new()),
                fail_configure: Cell::new(false),
                fail_writes: Cell::new(false),
                fail_reads: Cell::new(false),
            }
        }

        /// Queue a status frame for the next `read_frame()`.
        pub fn push_read(&self, frame: [u8; FRAME_SIZE]) {
            self.reads.borrow_mut().push_back(frame);
        }

        pub fn set_control_response(&self, value: u16, response: Vec<u8>) {
            self.control_responses.borrow_mut().insert(value, response);
        }

        /// Most recently written frame.
        pub fn last_written(&self) -> Option<[u8; FRAME_SIZE]> {
            self.written.borrow().last().copied()
        }

        fn ensure_configured(&self) -> Result<()> {
            if self.configured.get() {
                Ok(())
            } else {
                Err(DeviceError::NotConfigured)
            }
        }
    }

    impl RoboDevice for MockDevice {
        fn info(&self) -> &DeviceInfo {
            &self.info
        }

        fn configure(&mut self) -> Result<()> {
            self.configure_calls.set(self.configure_calls.get() + 1);
            if self.fail_configure.get() {
                self.configured.set(false);
                return Err(DeviceError::InitFailed(
                    "mock: configure failure injected".into(),
                ));
            }
            self.configured.set(true);
            Ok(())
        }

        fn control_in(
            &self,
            request: u8,
            value: u16,
            index: u16,
            length: usize,
        ) -> Result<Vec<u8>> {
            self.ensure_configured()?;
            self.control_requests
                .borrow_mut()
                .push((request, value, index, length));
            match self.control_responses.borrow().get(&value) {
                Some(resp) => Ok(resp.iter().copied().take(length).collect()),
                None => Err(DeviceError::TransferFailed(format!(
                    "mock: no control response for wValue={value}"
                ))),
            }
        }

        fn write_frame(&self, frame: &[u8; FRAME_SIZE]) -> Result<()> {
            self.ensure_configured()?;
            if self.fail_writes.get() {
                return Err(DeviceError::TransferFailed(
                    "mock: write failure injected".into(),
                ));
            }
            self.written.borrow_mut().push(*frame);
            Ok(())
        }

        fn read_frame(&self) -> Result<[u8; FRAME_SIZE]> {
            self.ensure_configured()?;
            if self.fail_reads.get() {
                return Err(DeviceError::TransferFailed(
                    "mock: read failure injected".into(),
                ));
            }
            self.reads
                .borrow_mut()
                .pop_front()
                .ok_or_else(|| DeviceError::TransferFailed("mock: no frame queued".into()))
        }
    }

    /// Backend over a fixed list of device paths. Counts `scan()` calls.
    pub struct MockBackend {
        pub devices: Vec<DiscoveredDevice>,
        pub scans: Cell<u32>,
    }

    impl MockBackend {
        pub fn new(devices: Vec<DiscoveredDevice>) -> Self {
            MockBackend {
                devices,
                scans: Cell::new(0),
            }
        }

        pub fn empty() -> Self {
            Self::new(Vec::new())
        }
    }

    impl Backend for MockBackend {
        type Handle = DiscoveredDevice;
        type Device = MockDevice;

        fn scan(&self) -> Vec<DiscoveredDevice> {
            self.scans.set(self.scans.get() + 1);
            self.devices.clone()
        }

        fn describe(&self, handle: &DiscoveredDevice) -> DiscoveredDevice {
            handle.clone()
        }

        fn attach(&self, handle: DiscoveredDevice) -> MockDevice {
            let mut dev = MockDevice::with_path(&handle.path);
            dev.info.serial = handle.serial;
            dev
        }
    }
}
