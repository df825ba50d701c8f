//! Integration tests: end-to-end output and input sequences using MockDevice.
//!
//! These drive a session through the public API the way an application
//! would, checking the exact frames that reach the interrupt OUT endpoint.

use robolt_lib::device::mock::{MockBackend, MockDevice};
use robolt_lib::device::{DeviceError, DiscoveredDevice, RoboDevice};
use robolt_lib::error::{RoboltError, ValidationError};
use robolt_lib::frame::OutputState;
use robolt_lib::protocol::*;
use robolt_lib::{Direction, RoboLt};

fn connected() -> RoboLt<MockDevice> {
    let backend = MockBackend::new(vec![DiscoveredDevice {
        path: "usb:001/007".into(),
        serial: Some("LT0001".into()),
    }]);
    RoboLt::connect(&backend, None).expect("mock device should attach")
}

// ── Motors and outputs ──

#[test]
fn motor_drive_brake_release() {
    let mut lt = connected();

    lt.set_motor(1, Direction::Left, 100).unwrap();
    lt.set_motor(1, Direction::Brake, 100).unwrap();
    lt.set_motor(1, Direction::Off, 0).unwrap();

    let written = lt.device().written.borrow();
    assert_eq!(
        written.as_slice(),
        &[
            [CMD_SET_OUTPUTS, 0x00, 0x00, 0x00, 0, 0], // init
            [CMD_SET_OUTPUTS, 0x01, 0x3f, 0x00, 0, 0], // left, full speed
            [CMD_SET_OUTPUTS, 0x03, 0x3f, 0x00, 0, 0], // brake
            [CMD_SET_OUTPUTS, 0x00, 0x00, 0x00, 0, 0], // off
        ]
    );
}

#[test]
fn mixed_motor_and_outputs_golden_frame() {
    let mut lt = connected();

    // M1 as independent outputs, M2 pair as O3/O4.
    lt.set_output(1, true, 0).unwrap();
    lt.set_output(2, false, 100).unwrap();
    lt.set_output(3, true, 50).unwrap();
    lt.set_output(4, false, 25).unwrap();

    assert_eq!(
        lt.outputs(),
        &OutputState::new([true, false, true, false], [0, 100, 50, 25]).unwrap()
    );
    assert_eq!(
        lt.device().last_written(),
        Some([0xf2, 0x05, 0xf8, 0x02, 0x00, 0x00])
    );
}

#[test]
fn motor_two_leaves_motor_one_alone() {
    let mut lt = connected();
    lt.set_motor(1, Direction::Right, 40).unwrap();
    let m1 = lt.outputs().clone();

    for dir in Direction::ALL {
        lt.set_motor(2, dir, 90).unwrap();
        assert_eq!(lt.outputs().enable()[..2], m1.enable()[..2]);
        assert_eq!(lt.outputs().duty()[..2], m1.duty()[..2]);
        assert_eq!(lt.outputs().motor_direction(2), Some(dir));
    }
}

#[test]
fn rejected_call_keeps_last_good_frame() {
    let mut lt = connected();
    lt.set_motor(2, Direction::Left, 70).unwrap();
    let frames = lt.device().written.borrow().len();
    let last = lt.device().last_written();

    let err = lt.set_motor(2, Direction::Left, 150).unwrap_err();
    assert!(matches!(
        err,
        RoboltError::Validation(ValidationError::Speed(150))
    ));
    assert_eq!(
        "sideways".parse::<Direction>(),
        Err(ValidationError::Direction("sideways".into()))
    );

    assert_eq!(lt.device().written.borrow().len(), frames);
    assert_eq!(lt.device().last_written(), last);
}

// ── Inputs ──

#[test]
fn status_read_sequence() {
    let lt = connected();
    let raw = [0x05, 10, 20, 30, 0b00_01_10_11, 0];
    lt.device().push_read(raw);
    lt.device().push_read(raw);
    lt.device().push_read(raw);

    assert_eq!(lt.read_digital_inputs().unwrap(), (true, false, true));
    let (a, b) = lt.read_analog_inputs().unwrap();
    assert_eq!(a, 778);
    assert!((b - 15.96).abs() < 1e-9);
    let v = lt.read_battery_voltage().unwrap();
    assert!((v - 8.58).abs() < 1e-9);
}

#[test]
fn read_status_decodes_everything_from_one_frame() {
    let lt = connected();
    lt.device().push_read([0x02, 0xff, 0, 0, 0x03, 0]);
    let status = lt.read_status().unwrap().status();
    assert_eq!(status.digital, [false, true, false]);
    assert_eq!(status.analog_a, 1023);
    assert!(lt.device().reads.borrow().is_empty());
}

// ── Info requests ──

#[test]
fn info_requests() {
    let lt = connected();
    lt.device()
        .set_control_response(INFO_FIRMWARE, vec![0, 1, 0, 2, 7]);
    let mut serial = vec![0u8; INFO_SERIAL_LEN];
    serial[1..4].copy_from_slice(&[99, 99, 1]);
    lt.device().set_control_response(INFO_SERIAL, serial);

    assert_eq!(lt.firmware_version().unwrap().to_string(), "1.0.2.7");
    assert_eq!(lt.serial().unwrap(), 19_999);
}

// ── Recovery ──

#[test]
fn transport_failure_then_retry() {
    let mut lt = connected();
    lt.device().fail_writes.set(true);
    assert!(matches!(
        lt.set_output(1, true, 100),
        Err(RoboltError::Device(DeviceError::TransferFailed(_)))
    ));

    lt.device().fail_writes.set(false);
    lt.reinit().unwrap();
    assert_eq!(lt.device().last_written(), Some([0xf2, 0x01, 0x07, 0x00, 0, 0]));
}

#[test]
fn explicit_handle_never_scans() {
    let backend = MockBackend::empty();
    let handle = DiscoveredDevice {
        path: "usb:004/002".into(),
        serial: None,
    };
    let lt = RoboLt::connect(&backend, Some(handle)).unwrap();
    assert_eq!(backend.scans.get(), 0);
    assert_eq!(lt.device().info().path, "usb:004/002");
}

#[test]
fn sessions_have_independent_shadow_state() {
    let mut a = RoboLt::new(MockDevice::new());
    let b = RoboLt::new(MockDevice::new());
    a.set_motor(1, Direction::Left, 100).unwrap();
    assert_eq!(b.outputs(), &OutputState::default());
    assert_eq!(b.device().written.borrow().len(), 1);
}
